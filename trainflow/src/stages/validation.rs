//! Checks the ingested partitions against the dataset schema.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::Stage;
use crate::config::DatasetSchema;
use crate::core::StageKind;
use crate::data::{Cell, Table};
use crate::entities::{DataIngestionArtifact, DataValidationArtifact, DataValidationConfig};
use crate::errors::{FailureCause, StageError};
use crate::utils::write_json;

/// Report written next to the validation artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when there are no mismatches.
    pub validation_status: bool,
    /// Mismatches joined with `"; "`.
    pub message: String,
    /// One entry per mismatch, prefixed with the partition name.
    pub mismatches: Vec<String>,
}

impl ValidationReport {
    fn from_mismatches(mismatches: Vec<String>) -> Self {
        Self {
            validation_status: mismatches.is_empty(),
            message: mismatches.join("; "),
            mismatches,
        }
    }
}

/// Lists how `table` deviates from `schema`. Empty means valid.
#[must_use]
pub fn validate_table(schema: &DatasetSchema, table: &Table, partition: &str) -> Vec<String> {
    let mut mismatches = Vec::new();

    if table.columns().len() != schema.columns.len() {
        mismatches.push(format!(
            "{partition}: expected {} columns, found {}",
            schema.columns.len(),
            table.columns().len()
        ));
    }

    let mut expected: Vec<&str> = schema.required_columns().collect();
    for name in schema
        .numerical_columns
        .iter()
        .chain(&schema.categorical_columns)
    {
        if !expected.contains(&name.as_str()) {
            expected.push(name);
        }
    }
    for name in expected {
        if table.column_index(name).is_none() {
            mismatches.push(format!("{partition}: missing column '{name}'"));
        }
    }

    for name in &schema.numerical_columns {
        let Some(cells) = table.column(name) else {
            continue;
        };
        let non_numeric = cells.filter(|c| matches!(c, Cell::Text(_))).count();
        if non_numeric > 0 {
            mismatches.push(format!(
                "{partition}: column '{name}' has {non_numeric} non-numeric values"
            ));
        }
    }

    mismatches
}

/// Validates both partitions and writes a report.
///
/// Mismatches are data, not an error: they come back in the artifact and the
/// orchestrator decides what to do. Only an unusable schema or unreadable
/// partitions fail the stage.
pub struct DataValidation<'a> {
    config: &'a DataValidationConfig,
    ingestion: &'a DataIngestionArtifact,
    schema: &'a DatasetSchema,
}

impl<'a> DataValidation<'a> {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        config: &'a DataValidationConfig,
        ingestion: &'a DataIngestionArtifact,
        schema: &'a DatasetSchema,
    ) -> Self {
        Self {
            config,
            ingestion,
            schema,
        }
    }

    fn run(&self) -> Result<DataValidationArtifact, FailureCause> {
        let problems = self.schema.check();
        if !problems.is_empty() {
            return Err(FailureCause::Schema(problems.join("; ")));
        }

        let train = Table::read_csv(&self.ingestion.trained_file_path)?;
        let test = Table::read_csv(&self.ingestion.test_file_path)?;

        let mut mismatches = validate_table(self.schema, &train, "train");
        mismatches.extend(validate_table(self.schema, &test, "test"));
        let report = ValidationReport::from_mismatches(mismatches);

        let path = &self.config.validation_report_file_path;
        write_json(path, &report)?;

        if report.validation_status {
            info!(report = %path.display(), "Dataset matches schema");
        } else {
            warn!(
                mismatches = report.mismatches.len(),
                message = %report.message,
                "Dataset does not match schema"
            );
        }

        Ok(DataValidationArtifact {
            validation_status: report.validation_status,
            message: report.message,
            validation_report_file_path: path.clone(),
        })
    }
}

#[async_trait]
impl Stage for DataValidation<'_> {
    type Artifact = DataValidationArtifact;

    fn kind(&self) -> StageKind {
        StageKind::Validation
    }

    async fn execute(&self) -> Result<DataValidationArtifact, StageError> {
        self.run().map_err(StageError::Validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{insurance_schema, insurance_table};
    use crate::utils::read_json;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn write_partitions(dir: &Path, train: &Table, test: &Table) -> DataIngestionArtifact {
        let artifact = DataIngestionArtifact {
            feature_store_file_path: dir.join("data.csv"),
            trained_file_path: dir.join("train.csv"),
            test_file_path: dir.join("test.csv"),
            total_rows: train.len() + test.len(),
            train_rows: train.len(),
            test_rows: test.len(),
        };
        train.write_csv(&artifact.trained_file_path).unwrap();
        test.write_csv(&artifact.test_file_path).unwrap();
        artifact
    }

    fn config(dir: &Path) -> DataValidationConfig {
        DataValidationConfig {
            data_validation_dir: dir.join("data_validation"),
            validation_report_file_path: dir.join("data_validation/report.json"),
        }
    }

    #[test]
    fn test_valid_table() {
        let schema = insurance_schema();
        assert!(validate_table(&schema, &insurance_table(10, 0), "train").is_empty());
    }

    #[test]
    fn test_missing_column_reported() {
        let schema = insurance_schema();
        let mut table = insurance_table(10, 0);
        table.drop_column("Vehicle_Damage");

        let mismatches = validate_table(&schema, &table, "test");
        assert_eq!(
            mismatches,
            vec![
                "test: expected 12 columns, found 11".to_string(),
                "test: missing column 'Vehicle_Damage'".to_string(),
            ]
        );
    }

    #[test]
    fn test_non_numeric_reported() {
        let schema = insurance_schema();
        let table = insurance_table(4, 0);
        let age = table.column_index("Age").unwrap();
        let rows = table
            .rows()
            .iter()
            .cloned()
            .map(|mut r| {
                r[age] = Cell::Text("old".into());
                r
            })
            .collect();
        let table = Table::new(table.columns().to_vec(), rows);

        let mismatches = validate_table(&schema, &table, "train");
        assert_eq!(mismatches, vec!["train: column 'Age' has 4 non-numeric values".to_string()]);
    }

    #[tokio::test]
    async fn test_report_written_for_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let schema = insurance_schema();
        let mut test = insurance_table(10, 1);
        test.drop_column("Age");
        let ingestion = write_partitions(dir.path(), &insurance_table(30, 0), &test);
        let config = config(dir.path());

        let artifact = DataValidation::new(&config, &ingestion, &schema)
            .execute()
            .await
            .unwrap();
        assert!(!artifact.validation_status);
        assert!(artifact.message.contains("missing column 'Age'"));

        let report: ValidationReport = read_json(&artifact.validation_report_file_path).unwrap();
        assert!(!report.validation_status);
        assert_eq!(report.mismatches.len(), 2);
    }

    #[tokio::test]
    async fn test_broken_schema_is_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut schema = insurance_schema();
        schema.target_column = "Nope".to_string();
        let table = insurance_table(10, 0);
        let ingestion = write_partitions(dir.path(), &table, &table);
        let config = config(dir.path());

        let err = DataValidation::new(&config, &ingestion, &schema)
            .execute()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), StageKind::Validation);
        assert!(matches!(err.cause(), FailureCause::Schema(_)));
        assert!(!config.validation_report_file_path.exists());
    }
}
