//! Error types for the trainflow pipeline.
//!
//! The taxonomy is layered: configuration and storage errors are leaves,
//! [`FailureCause`] describes why a stage could not finish, [`StageError`]
//! names the stage that failed and [`PipelineError`] adds run context. Display
//! strings describe a single layer; walk [`std::error::Error::source`] (or use
//! [`error_chain`]) for the full story.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::{PipelineState, StageKind};

/// Boxed error used where the concrete client error type is not part of the API.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Missing or invalid settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was not provided under any of its keys.
    #[error("missing setting '{field}' (looked up {})", keys.join(", "))]
    Missing {
        /// Logical field name.
        field: &'static str,
        /// Environment keys consulted, in order.
        keys: &'static [&'static str],
    },

    /// A setting was present but could not be used.
    #[error("invalid value '{value}' for '{key}': {reason}")]
    Invalid {
        /// Key or field that carried the value.
        key: String,
        /// The offending value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The `.env` file exists but could not be parsed.
    #[error("failed to load env file {}", path.display())]
    EnvFile {
        /// Path of the env file.
        path: PathBuf,
        /// Underlying parser error.
        #[source]
        source: dotenvy::Error,
    },

    /// A configuration file could not be read.
    #[error("failed to read {}", path.display())]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The dataset schema file is not valid YAML for [`crate::config::DatasetSchema`].
    #[error("failed to parse schema file {}", path.display())]
    Schema {
        /// Path of the schema file.
        path: PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    /// Creates an invalid-value error.
    #[must_use]
    pub fn invalid(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Invalid {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Failures talking to the document store or the object store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The connector cannot be built because settings are missing.
    #[error("storage connector is not configured")]
    Configuration(#[from] ConfigError),

    /// The remote host could not be reached.
    #[error("cannot connect to {target}")]
    Connection {
        /// Redacted description of the remote.
        target: String,
        /// Client error.
        #[source]
        source: BoxError,
    },

    /// Object-store access keys are missing or rejected.
    #[error("object store credentials unavailable")]
    Credential(#[source] ConfigError),

    /// Reading a collection failed after connecting.
    #[error("failed to read collection '{collection}'")]
    Query {
        /// Collection name.
        collection: String,
        /// Client error.
        #[source]
        source: BoxError,
    },

    /// Uploading an object failed.
    #[error("failed to upload s3://{bucket}/{key}")]
    Upload {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Client error.
        #[source]
        source: BoxError,
    },

    /// Downloading an object failed.
    #[error("failed to download s3://{bucket}/{key}")]
    Download {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Client error.
        #[source]
        source: BoxError,
    },

    /// The requested object does not exist.
    #[error("object s3://{bucket}/{key} not found")]
    NotFound {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },
}

impl StorageError {
    /// Returns true when the error only means "nothing stored there yet".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Why a stage could not produce its artifact.
#[derive(Debug, Error)]
pub enum FailureCause {
    /// Settings needed by the stage are missing or invalid.
    #[error("configuration error")]
    Config(#[from] ConfigError),

    /// A connector call failed.
    #[error("storage error")]
    Storage(#[from] StorageError),

    /// Reading or writing a local artifact failed.
    #[error("I/O error on {}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A JSON artifact could not be encoded or decoded.
    #[error("JSON error on {}", path.display())]
    Json {
        /// File involved.
        path: PathBuf,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// A CSV table could not be written or read.
    #[error("CSV error on {}", path.display())]
    Csv {
        /// File involved.
        path: PathBuf,
        /// Underlying csv error.
        #[source]
        source: csv::Error,
    },

    /// The schema definition itself is unusable.
    #[error("schema violation: {0}")]
    Schema(String),

    /// Data validation reported mismatches and the run policy is to halt.
    #[error("dataset failed validation: {message} (report: {})", report.display())]
    ValidationFailed {
        /// Summary of the mismatches.
        message: String,
        /// Where the full report was written.
        report: PathBuf,
    },

    /// A value could not be encoded into a feature.
    #[error("column '{column}' row {row}: {reason}")]
    Unencodable {
        /// Column name.
        column: String,
        /// Zero-based row index within the partition.
        row: usize,
        /// What was wrong with the value.
        reason: String,
    },

    /// The trained model did not reach the configured accuracy.
    #[error("model accuracy {accuracy:.4} is below expected {expected:.4}")]
    BelowExpectedAccuracy {
        /// Measured test accuracy.
        accuracy: f64,
        /// Configured minimum.
        expected: f64,
    },

    /// Not enough rows to continue.
    #[error("dataset '{name}' has {rows} rows, at least {required} required")]
    EmptyDataset {
        /// Dataset or partition name.
        name: String,
        /// Rows available.
        rows: usize,
        /// Rows required.
        required: usize,
    },

    /// Serialized model bytes could not be decoded.
    #[error("model artifact from {origin} is corrupt")]
    CorruptModel {
        /// Where the bytes came from.
        origin: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
}

/// A stage failed. The variant names the stage, the source says why.
#[derive(Debug, Error)]
pub enum StageError {
    /// Data ingestion failed.
    #[error("data ingestion failed")]
    Ingestion(#[source] FailureCause),

    /// Data validation hit a hard violation (soft mismatches are reported as data).
    #[error("data validation failed")]
    Validation(#[source] FailureCause),

    /// Feature transformation failed.
    #[error("data transformation failed")]
    Transformation(#[source] FailureCause),

    /// Model training failed or under-performed.
    #[error("model training failed")]
    Training(#[source] FailureCause),

    /// Model evaluation failed.
    #[error("model evaluation failed")]
    Evaluation(#[source] FailureCause),

    /// Publishing the model failed.
    #[error("model publish failed")]
    Publish(#[source] FailureCause),
}

impl StageError {
    /// The stage that raised the error.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Ingestion(_) => StageKind::Ingestion,
            Self::Validation(_) => StageKind::Validation,
            Self::Transformation(_) => StageKind::Transformation,
            Self::Training(_) => StageKind::Training,
            Self::Evaluation(_) => StageKind::Evaluation,
            Self::Publish(_) => StageKind::Publishing,
        }
    }

    /// The underlying cause.
    #[must_use]
    pub fn cause(&self) -> &FailureCause {
        match self {
            Self::Ingestion(c)
            | Self::Validation(c)
            | Self::Transformation(c)
            | Self::Training(c)
            | Self::Evaluation(c)
            | Self::Publish(c) => c,
        }
    }
}

/// A pipeline run stopped.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage failed; the run halted without retry or cleanup.
    #[error("pipeline '{pipeline}' (run {run_id}) halted in state {state}")]
    Halted {
        /// Pipeline name.
        pipeline: String,
        /// Run timestamp.
        run_id: String,
        /// State in which the failure happened.
        state: PipelineState,
        /// The stage failure.
        #[source]
        source: StageError,
    },

    /// The orchestrator tried to enter a state out of order.
    #[error("illegal pipeline transition {from} -> {to}")]
    IllegalTransition {
        /// Current state.
        from: PipelineState,
        /// Requested state.
        to: PipelineState,
    },
}

impl PipelineError {
    /// Returns the stage error when the run halted in a stage.
    #[must_use]
    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            Self::Halted { source, .. } => Some(source),
            Self::IllegalTransition { .. } => None,
        }
    }

    /// Converts to a dictionary representation for run reports.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("chain".to_string(), serde_json::json!(error_chain(self)));
        if let Self::Halted { state, source, .. } = self {
            map.insert("state".to_string(), serde_json::json!(state));
            map.insert("stage".to_string(), serde_json::json!(source.kind()));
        }
        map
    }
}

/// Error category used in failure records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing or invalid settings.
    Configuration,
    /// Connectivity or credentials.
    Connection,
    /// Object transfer.
    Transfer,
    /// Local artifact IO or encoding.
    Artifact,
    /// Data did not meet expectations.
    Data,
    /// Model quality gate.
    Quality,
}

impl FailureCause {
    /// Coarse category, used for failure records and exit reporting.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Storage(StorageError::Configuration(_)) => ErrorCategory::Configuration,
            Self::Storage(
                StorageError::Connection { .. }
                | StorageError::Credential(_)
                | StorageError::Query { .. },
            ) => ErrorCategory::Connection,
            Self::Storage(_) => ErrorCategory::Transfer,
            Self::Io { .. } | Self::Json { .. } | Self::Csv { .. } | Self::CorruptModel { .. } => {
                ErrorCategory::Artifact
            }
            Self::Schema(_)
            | Self::ValidationFailed { .. }
            | Self::Unencodable { .. }
            | Self::EmptyDataset { .. } => ErrorCategory::Data,
            Self::BelowExpectedAccuracy { .. } => ErrorCategory::Quality,
        }
    }
}

/// Collects the display strings of an error and all of its sources.
#[must_use]
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut current = err.source();
    while let Some(source) = current {
        chain.push(source.to_string());
        current = source.source();
    }
    chain
}
