//! Fits the preprocessor and encodes both partitions.

use async_trait::async_trait;
use tracing::{info, warn};

use super::Stage;
use crate::config::DatasetSchema;
use crate::core::StageKind;
use crate::data::Table;
use crate::entities::{
    DataIngestionArtifact, DataTransformationArtifact, DataTransformationConfig,
    DataValidationArtifact,
};
use crate::errors::{FailureCause, StageError};
use crate::ml::{EncodedPartition, Preprocessor};
use crate::utils::write_json;

/// Encodes the ingested partitions for training.
pub struct DataTransformation<'a> {
    config: &'a DataTransformationConfig,
    ingestion: &'a DataIngestionArtifact,
    validation: &'a DataValidationArtifact,
    schema: &'a DatasetSchema,
}

impl<'a> DataTransformation<'a> {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        config: &'a DataTransformationConfig,
        ingestion: &'a DataIngestionArtifact,
        validation: &'a DataValidationArtifact,
        schema: &'a DatasetSchema,
    ) -> Self {
        Self {
            config,
            ingestion,
            validation,
            schema,
        }
    }

    fn run(&self) -> Result<DataTransformationArtifact, FailureCause> {
        if !self.validation.validation_status {
            warn!(message = %self.validation.message, "Transforming data that failed validation");
        }

        let train = Table::read_csv(&self.ingestion.trained_file_path)?;
        let test = Table::read_csv(&self.ingestion.test_file_path)?;

        let preprocessor = Preprocessor::fit(self.schema, &train)?;
        let (features, labels) = preprocessor.transform(&train)?;
        let train_encoded = EncodedPartition { features, labels };
        let (features, labels) = preprocessor.transform(&test)?;
        let test_encoded = EncodedPartition { features, labels };

        write_json(&self.config.transformed_train_file_path, &train_encoded)?;
        write_json(&self.config.transformed_test_file_path, &test_encoded)?;
        write_json(&self.config.transformed_object_file_path, &preprocessor)?;

        info!(
            features = preprocessor.n_features(),
            train_rows = train_encoded.labels.len(),
            test_rows = test_encoded.labels.len(),
            "Transformed partitions"
        );

        Ok(DataTransformationArtifact {
            transformed_object_file_path: self.config.transformed_object_file_path.clone(),
            transformed_train_file_path: self.config.transformed_train_file_path.clone(),
            transformed_test_file_path: self.config.transformed_test_file_path.clone(),
        })
    }
}

#[async_trait]
impl Stage for DataTransformation<'_> {
    type Artifact = DataTransformationArtifact;

    fn kind(&self) -> StageKind {
        StageKind::Transformation
    }

    async fn execute(&self) -> Result<DataTransformationArtifact, StageError> {
        self.run().map_err(StageError::Transformation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Cell;
    use crate::testing::fixtures::{insurance_schema, insurance_table};
    use crate::utils::{read_bytes, read_json};
    use std::path::Path;

    fn inputs(dir: &Path, train: &Table, test: &Table) -> (DataIngestionArtifact, DataValidationArtifact) {
        let ingestion = DataIngestionArtifact {
            feature_store_file_path: dir.join("data.csv"),
            trained_file_path: dir.join("train.csv"),
            test_file_path: dir.join("test.csv"),
            total_rows: train.len() + test.len(),
            train_rows: train.len(),
            test_rows: test.len(),
        };
        train.write_csv(&ingestion.trained_file_path).unwrap();
        test.write_csv(&ingestion.test_file_path).unwrap();
        let validation = DataValidationArtifact {
            validation_status: true,
            message: String::new(),
            validation_report_file_path: dir.join("report.json"),
        };
        (ingestion, validation)
    }

    fn config(dir: &Path) -> DataTransformationConfig {
        DataTransformationConfig {
            data_transformation_dir: dir.to_path_buf(),
            transformed_train_file_path: dir.join("transformed/train.json"),
            transformed_test_file_path: dir.join("transformed/test.json"),
            transformed_object_file_path: dir.join("transformed_object/preprocessing.json"),
        }
    }

    #[tokio::test]
    async fn test_writes_encoded_partitions_and_preprocessor() {
        let dir = tempfile::tempdir().unwrap();
        let schema = insurance_schema();
        let (ingestion, validation) = inputs(dir.path(), &insurance_table(40, 0), &insurance_table(12, 1));
        let config = config(&dir.path().join("out"));

        let artifact = DataTransformation::new(&config, &ingestion, &validation, &schema)
            .execute()
            .await
            .unwrap();

        let train: EncodedPartition = read_json(&artifact.transformed_train_file_path).unwrap();
        let preprocessor: Preprocessor = read_json(&artifact.transformed_object_file_path).unwrap();
        assert_eq!(train.features.nrows(), 40);
        assert_eq!(train.features.ncols(), preprocessor.n_features());
        assert_eq!(train.labels.len(), 40);
    }

    #[tokio::test]
    async fn test_output_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let schema = insurance_schema();
        let (ingestion, validation) = inputs(dir.path(), &insurance_table(30, 3), &insurance_table(10, 4));

        let first = config(&dir.path().join("a"));
        let second = config(&dir.path().join("b"));
        DataTransformation::new(&first, &ingestion, &validation, &schema)
            .execute()
            .await
            .unwrap();
        DataTransformation::new(&second, &ingestion, &validation, &schema)
            .execute()
            .await
            .unwrap();

        for (a, b) in [
            (&first.transformed_train_file_path, &second.transformed_train_file_path),
            (&first.transformed_test_file_path, &second.transformed_test_file_path),
            (&first.transformed_object_file_path, &second.transformed_object_file_path),
        ] {
            assert_eq!(read_bytes(a).unwrap(), read_bytes(b).unwrap());
        }
    }

    #[tokio::test]
    async fn test_missing_value_fails_with_column_and_row() {
        let dir = tempfile::tempdir().unwrap();
        let schema = insurance_schema();
        let train = insurance_table(20, 0);
        let premium = train.column_index("Annual_Premium").unwrap();
        let rows = train
            .rows()
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, mut r)| {
                if i == 5 {
                    r[premium] = Cell::Missing;
                }
                r
            })
            .collect();
        let train = Table::new(train.columns().to_vec(), rows);
        let (ingestion, validation) = inputs(dir.path(), &train, &insurance_table(5, 1));
        let config = config(&dir.path().join("out"));

        let err = DataTransformation::new(&config, &ingestion, &validation, &schema)
            .execute()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), StageKind::Transformation);
        match err.cause() {
            FailureCause::Unencodable { column, row, .. } => {
                assert_eq!(column, "Annual_Premium");
                assert_eq!(*row, 5);
            }
            other => panic!("unexpected cause: {other:?}"),
        }
        assert!(!config.transformed_object_file_path.exists());
    }
}
