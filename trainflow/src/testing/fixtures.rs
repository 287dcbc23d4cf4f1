//! Synthetic vehicle-insurance data, schema and settings for tests.

#![allow(clippy::expect_used)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;

use crate::config::{DatasetSchema, Settings};
use crate::connectors::Record;
use crate::data::Table;

/// Collection name used by the fixtures.
pub const COLLECTION: &str = "Proj1-Data";

/// Bucket used by the fixtures.
pub const BUCKET: &str = "test-model-registry";

/// The shipped dataset schema, which [`insurance_records`] follows.
pub const INSURANCE_SCHEMA_YAML: &str = include_str!("../../../config/schema.yaml");

const VEHICLE_AGES: [&str; 3] = ["< 1 Year", "1-2 Year", "> 2 Years"];

/// The fixture schema.
///
/// # Panics
///
/// If `config/schema.yaml` stops parsing.
#[must_use]
pub fn insurance_schema() -> DatasetSchema {
    DatasetSchema::from_yaml_str(INSURANCE_SCHEMA_YAML).expect("fixture schema is valid")
}

/// `n` seeded records shaped like the document store's rows.
///
/// `Response` is 1 when the vehicle was damaged and not previously insured,
/// with a few labels flipped, so a classifier can learn it but not perfectly.
/// Categorical values cycle with the row index so every category shows up in
/// any sizeable partition.
#[must_use]
pub fn insurance_records(n: usize, seed: u64) -> Vec<Record> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let damaged = rng.gen_bool(0.5);
            let insured = rng.gen_bool(0.4);
            let noise = rng.gen_bool(0.05);
            let response = u8::from((damaged && !insured) != noise);

            let value = json!({
                "_id": format!("{:024x}", i + 1),
                "id": i + 1,
                "Gender": if i % 2 == 0 { "Male" } else { "Female" },
                "Age": rng.gen_range(20..70),
                "Driving_License": 1,
                "Region_Code": f64::from(rng.gen_range(0..50_u8)),
                "Previously_Insured": u8::from(insured),
                "Vehicle_Age": VEHICLE_AGES[i % VEHICLE_AGES.len()],
                "Vehicle_Damage": if damaged { "Yes" } else { "No" },
                "Annual_Premium": (rng.gen_range(2_630.0..60_000.0_f64) * 100.0).round() / 100.0,
                "Policy_Sales_Channel": f64::from(rng.gen_range(1..160_u8)),
                "Vintage": rng.gen_range(10..300),
                "Response": response,
            });
            match value {
                serde_json::Value::Object(map) => map,
                _ => Record::new(),
            }
        })
        .collect()
}

/// [`insurance_records`] as a table without the store id column.
#[must_use]
pub fn insurance_table(n: usize, seed: u64) -> Table {
    let mut table = Table::from_records(&insurance_records(n, seed));
    table.drop_column("_id");
    table
}

/// Settings rooted at `artifact_dir` with a small forest and the fixture bucket.
///
/// `overrides` replace or add environment entries.
///
/// # Panics
///
/// If an override carries an unparseable value.
#[must_use]
pub fn test_settings(artifact_dir: &Path, overrides: &[(&str, &str)]) -> Settings {
    let root = artifact_dir.to_string_lossy().into_owned();
    let mut env: HashMap<String, String> = [
        ("ARTIFACT_DIR", root.as_str()),
        ("DATABASE_URL", "mongodb://localhost:27017"),
        ("COLLECTION_NAME", COLLECTION),
        ("MODEL_BUCKET_NAME", BUCKET),
        ("MODEL_TRAINER_N_ESTIMATORS", "15"),
        ("MODEL_TRAINER_MAX_DEPTH", "6"),
        ("MODEL_TRAINER_MIN_SAMPLES_SPLIT", "4"),
        ("MODEL_TRAINER_MIN_SAMPLES_LEAF", "2"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (key, value) in overrides {
        env.insert((*key).to_string(), (*value).to_string());
    }

    Settings::resolve(|key| env.get(key).cloned()).expect("fixture settings are valid")
}
