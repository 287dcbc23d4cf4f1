//! Stage trait and the six training stages.
//!
//! A stage borrows its config, the artifacts it depends on and any
//! connector it needs, so a stage cannot be built before its inputs exist.

mod evaluation;
mod ingestion;
mod pusher;
mod trainer;
mod transformation;
mod validation;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::StageKind;
use crate::errors::StageError;

pub use evaluation::{is_model_accepted, ModelEvaluation};
pub use ingestion::DataIngestion;
pub use pusher::ModelPusher;
pub use trainer::ModelTrainer;
pub use transformation::DataTransformation;
pub use validation::{validate_table, DataValidation, ValidationReport};

/// One step of the training pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// What the stage produces on success.
    type Artifact: Serialize + Send;

    /// Which stage this is.
    fn kind(&self) -> StageKind;

    /// Runs the stage once.
    async fn execute(&self) -> Result<Self::Artifact, StageError>;
}
