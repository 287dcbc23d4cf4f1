//! Artifacts handed from one stage to the next.
//!
//! Each artifact is produced once, by one stage, and only read afterwards.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ml::ClassificationMetrics;

/// Output of ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataIngestionArtifact {
    /// Full exported table.
    pub feature_store_file_path: PathBuf,
    /// Train partition.
    pub trained_file_path: PathBuf,
    /// Test partition.
    pub test_file_path: PathBuf,
    /// Rows fetched.
    pub total_rows: usize,
    /// Rows in the train partition.
    pub train_rows: usize,
    /// Rows in the test partition.
    pub test_rows: usize,
}

/// Output of validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataValidationArtifact {
    /// True when both partitions match the schema.
    pub validation_status: bool,
    /// Mismatches joined into one line, empty when valid.
    pub message: String,
    /// Where the full report was written.
    pub validation_report_file_path: PathBuf,
}

/// Output of transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTransformationArtifact {
    /// Fitted preprocessor.
    pub transformed_object_file_path: PathBuf,
    /// Encoded train partition.
    pub transformed_train_file_path: PathBuf,
    /// Encoded test partition.
    pub transformed_test_file_path: PathBuf,
}

/// Output of training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTrainerArtifact {
    /// Serialized model.
    pub trained_model_file_path: PathBuf,
    /// Test-partition scores.
    pub metric_artifact: ClassificationMetrics,
}

/// Output of evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluationArtifact {
    /// The accept/reject decision.
    pub is_model_accepted: bool,
    /// Candidate F1 minus production F1 (candidate F1 when there is no production model).
    pub changed_accuracy: f64,
    /// Candidate F1 on the test partition.
    pub trained_model_score: f64,
    /// Production F1 on the same partition, if a production model exists.
    pub production_model_score: Option<f64>,
    /// Local path of the candidate model.
    pub trained_model_path: PathBuf,
    /// Registry key the candidate would replace.
    pub s3_model_path: String,
}

/// Output of publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPusherArtifact {
    /// Bucket written to.
    pub bucket_name: String,
    /// Key written to.
    pub s3_model_path: String,
    /// Hex SHA-256 of the uploaded bytes.
    pub model_sha256: String,
    /// Uploaded size.
    pub size_bytes: usize,
}
