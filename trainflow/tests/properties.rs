//! Property tests for splitting, validation and model acceptance.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;

use trainflow::data::{Cell, Table};
use trainflow::stages::{is_model_accepted, validate_table};
use trainflow::testing::fixtures::{insurance_schema, insurance_table};

fn numbered_table(rows: usize) -> Table {
    let rows = (0..rows).map(|i| vec![Cell::Number(i as f64)]).collect();
    Table::new(vec!["row".to_string()], rows)
}

proptest! {
    #[test]
    fn split_keeps_every_row(rows in 2usize..400, ratio in 0.01f64..0.99, seed in any::<u64>()) {
        let table = numbered_table(rows);
        let (train, test) = table.split(ratio, seed);

        prop_assert_eq!(train.len() + test.len(), rows);
        prop_assert!(!train.is_empty() && !test.is_empty());
        prop_assert!((test.len() as f64 - ratio * rows as f64).abs() < 1.0);

        let mut seen: Vec<String> = train
            .rows()
            .iter()
            .chain(test.rows())
            .map(|row| row[0].to_string())
            .collect();
        seen.sort();
        seen.dedup();
        prop_assert_eq!(seen.len(), rows);
    }

    #[test]
    fn dropping_required_columns_is_reported(drop in proptest::sample::subsequence(
        insurance_schema().required_columns().map(str::to_string).collect::<Vec<_>>(),
        1..=4,
    )) {
        let schema = insurance_schema();
        let mut table = insurance_table(30, 1);
        prop_assert!(validate_table(&schema, &table, "train").is_empty());

        for column in &drop {
            table.drop_column(column);
        }
        let mismatches = validate_table(&schema, &table, "train");
        prop_assert!(!mismatches.is_empty());
        for column in &drop {
            prop_assert!(mismatches.iter().any(|m| m.contains(column.as_str())));
        }
    }

    #[test]
    fn acceptance_is_a_strict_margin(
        candidate in 0.0f64..=1.0,
        production in 0.0f64..=1.0,
        threshold in 0.0f64..0.2,
    ) {
        prop_assert_eq!(
            is_model_accepted(candidate, Some(production), threshold),
            candidate - production > threshold
        );
        prop_assert!(is_model_accepted(candidate, None, threshold));
        prop_assert!(!is_model_accepted(production, Some(production), threshold));
    }
}
