//! # Trainflow
//!
//! A staged training pipeline for a tabular binary classifier.
//!
//! A run pulls records from a document store, validates them against a YAML
//! dataset schema, encodes features, trains a random forest, compares it with
//! the model currently in the registry bucket and publishes it when it wins:
//!
//! `Ingest → Validate → Transform → Train → Evaluate → (Push | Skip) → Done`
//!
//! Every stage writes its artifacts under `<artifact root>/<run timestamp>/`
//! and hands a typed artifact to the next one. The first failure halts the run.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trainflow::prelude::*;
//!
//! let settings = Settings::from_env(None)?;
//! let schema = DatasetSchema::from_yaml_file(&settings.pipeline.schema_file_path)?;
//! let connectors = Connectors::from_settings(&settings);
//!
//! let report = TrainPipeline::new(settings, schema, connectors).run().await?;
//! println!("pushed: {}", report.outcome.is_pushed());
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod connectors;
pub mod core;
pub mod data;
pub mod entities;
pub mod errors;
pub mod events;
pub mod ml;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{DatasetSchema, Settings, ValidationPolicy};
    pub use crate::connectors::{Connectors, DocumentStore, ObjectStorage};
    pub use crate::core::{PipelineState, RunIdentity, StageKind};
    pub use crate::entities::{
        DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact,
        ModelEvaluationArtifact, ModelPusherArtifact, ModelTrainerArtifact, StageConfigs,
    };
    pub use crate::errors::{
        ConfigError, ErrorCategory, FailureCause, PipelineError, StageError, StorageError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{RunOutcome, RunReport, TrainPipeline};
    pub use crate::stages::Stage;
}
