//! Row-major tables built from store records and persisted as CSV.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::connectors::Record;
use crate::errors::FailureCause;
use crate::utils::ensure_parent_dir;

/// String the source data uses for "no value".
pub const MISSING_SENTINEL: &str = "na";

/// One table value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// No value.
    Missing,
    /// Any numeric value.
    Number(f64),
    /// Anything else.
    Text(String),
}

impl Cell {
    /// Parses a CSV field: empty is missing, numbers are numbers.
    #[must_use]
    pub fn parse(field: &str) -> Self {
        if field.is_empty() {
            Self::Missing
        } else if let Ok(n) = field.parse::<f64>() {
            Self::Number(n)
        } else {
            Self::Text(field.to_string())
        }
    }

    /// Converts a JSON value, mapping null and the sentinel to missing.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Missing,
            Value::Bool(b) => Self::Number(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => n.as_f64().map_or(Self::Missing, Self::Number),
            Value::String(s) if s == MISSING_SENTINEL => Self::Missing,
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    /// The numeric value, if any.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// True for [`Cell::Missing`].
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => Ok(()),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Named columns over rows of cells. Every row has one cell per column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Creates a table, padding or truncating rows to the column count.
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Missing);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Builds a table from store records.
    ///
    /// Columns are the union of keys in first-seen order; absent keys become
    /// missing cells.
    #[must_use]
    pub fn from_records(records: &[Record]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).map_or(Cell::Missing, Cell::from_json))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    /// Column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[index]))
    }

    /// Removes a column. Returns false if it did not exist.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(index) = self.column_index(name) else {
            return false;
        };
        self.columns.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
        true
    }

    /// Shuffles rows with a seeded RNG and splits off a test partition.
    ///
    /// Returns `(train, test)`; see [`test_partition_size`] for the sizes.
    #[must_use]
    pub fn split(&self, test_ratio: f64, seed: u64) -> (Self, Self) {
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        order.shuffle(&mut rng);

        let test_size = test_partition_size(self.rows.len(), test_ratio);
        let (test_idx, train_idx) = order.split_at(test_size);
        let take = |indices: &[usize]| Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        };
        (take(train_idx), take(test_idx))
    }

    /// Writes the table as CSV with a header row.
    pub fn write_csv(&self, path: &Path) -> Result<(), FailureCause> {
        let csv_error = |source| FailureCause::Csv {
            path: path.to_path_buf(),
            source,
        };
        ensure_parent_dir(path)?;

        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
        writer.write_record(&self.columns).map_err(csv_error)?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(ToString::to_string))
                .map_err(csv_error)?;
        }
        writer.flush().map_err(|source| FailureCause::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads a CSV file written by [`Table::write_csv`].
    pub fn read_csv(path: &Path) -> Result<Self, FailureCause> {
        let csv_error = |source| FailureCause::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
        let columns: Vec<String> = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(str::to_string)
            .collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(Cell::parse).collect()))
            .collect::<Result<Vec<Vec<Cell>>, _>>()
            .map_err(csv_error)?;
        Ok(Self::new(columns, rows))
    }
}

/// Rows assigned to the test partition: `ceil(n * ratio)` kept within `[1, n - 1]`.
///
/// Tables with fewer than two rows cannot be split and yield 0.
#[must_use]
pub fn test_partition_size(rows: usize, test_ratio: f64) -> usize {
    if rows < 2 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let raw = (rows as f64 * test_ratio).ceil().max(0.0) as usize;
    raw.clamp(1, rows - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn records() -> Vec<Record> {
        let values = [
            json!({"_id": "a", "Gender": "Male", "Age": 44, "Region_Code": "na"}),
            json!({"_id": "b", "Gender": "Female", "Age": 22, "Region_Code": 28.0}),
            json!({"_id": "c", "Gender": "Male", "Age": null}),
        ];
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_from_records_normalises_values() {
        let mut table = Table::from_records(&records());
        assert_eq!(table.columns(), ["_id", "Gender", "Age", "Region_Code"]);
        assert!(table.drop_column("_id"));
        assert!(!table.drop_column("_id"));

        assert_eq!(
            table.rows()[0],
            vec![Cell::Text("Male".into()), Cell::Number(44.0), Cell::Missing]
        );
        assert_eq!(table.rows()[2][1], Cell::Missing);
        assert_eq!(table.rows()[2][2], Cell::Missing);
    }

    #[test]
    fn test_partition_sizes() {
        assert_eq!(test_partition_size(100, 0.25), 25);
        assert_eq!(test_partition_size(10, 0.25), 3);
        assert_eq!(test_partition_size(2, 0.01), 1);
        assert_eq!(test_partition_size(2, 0.99), 1);
        assert_eq!(test_partition_size(1, 0.5), 0);
    }

    #[test]
    fn test_split_is_seeded_and_complete() {
        let rows = (0..20).map(|i| vec![Cell::Number(f64::from(i))]).collect();
        let table = Table::new(vec!["x".into()], rows);

        let (train_a, test_a) = table.split(0.25, 7);
        let (train_b, test_b) = table.split(0.25, 7);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(train_a.len(), 15);
        assert_eq!(test_a.len(), 5);

        let mut all: Vec<f64> = train_a
            .rows()
            .iter()
            .chain(test_a.rows())
            .filter_map(|r| r[0].as_f64())
            .collect();
        all.sort_by(f64::total_cmp);
        assert_eq!(all, (0..20).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.csv");
        let mut table = Table::from_records(&records());
        table.drop_column("_id");

        table.write_csv(&path).unwrap();
        let back = Table::read_csv(&path).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_read_csv_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Table::read_csv(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, FailureCause::Csv { .. }));
    }
}
