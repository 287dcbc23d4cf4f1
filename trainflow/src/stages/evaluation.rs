//! Compares the candidate model against the production model.

use async_trait::async_trait;
use tracing::info;

use super::Stage;
use crate::connectors::ObjectStorage;
use crate::core::StageKind;
use crate::data::Table;
use crate::entities::{
    DataIngestionArtifact, ModelEvaluationArtifact, ModelEvaluationConfig, ModelTrainerArtifact,
};
use crate::errors::{FailureCause, StageError};
use crate::ml::TrainedModel;
use crate::utils::read_bytes;

/// The acceptance rule.
///
/// Without a production model every candidate is accepted; otherwise the
/// candidate must beat production by strictly more than `threshold`.
#[must_use]
pub fn is_model_accepted(candidate: f64, production: Option<f64>, threshold: f64) -> bool {
    match production {
        None => true,
        Some(production) => candidate - production > threshold,
    }
}

/// Scores candidate and production F1 on the held-out test partition.
pub struct ModelEvaluation<'a> {
    config: &'a ModelEvaluationConfig,
    ingestion: &'a DataIngestionArtifact,
    trainer: &'a ModelTrainerArtifact,
    objects: &'a dyn ObjectStorage,
}

impl<'a> ModelEvaluation<'a> {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        config: &'a ModelEvaluationConfig,
        ingestion: &'a DataIngestionArtifact,
        trainer: &'a ModelTrainerArtifact,
        objects: &'a dyn ObjectStorage,
    ) -> Self {
        Self {
            config,
            ingestion,
            trainer,
            objects,
        }
    }

    /// Downloads the production model, or `None` if nothing is deployed yet.
    pub async fn get_best_model(&self) -> Result<Option<TrainedModel>, FailureCause> {
        let bucket = &self.config.bucket_name;
        let key = &self.config.s3_model_key_path;
        match self.objects.get_object(bucket, key).await {
            Ok(bytes) => Ok(Some(TrainedModel::from_bytes(
                &bytes,
                &format!("s3://{bucket}/{key}"),
            )?)),
            Err(e) if e.is_not_found() => {
                info!(bucket = %bucket, key = %key, "No production model found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn run(&self) -> Result<ModelEvaluationArtifact, FailureCause> {
        let test = Table::read_csv(&self.ingestion.test_file_path)?;

        let path = &self.trainer.trained_model_file_path;
        let candidate = TrainedModel::from_bytes(&read_bytes(path)?, &path.display().to_string())?;
        let trained_model_score = candidate.evaluate(&test)?.f1_score;

        let production_model_score = match self.get_best_model().await? {
            Some(production) => Some(production.evaluate(&test)?.f1_score),
            None => None,
        };

        let accepted = is_model_accepted(
            trained_model_score,
            production_model_score,
            self.config.changed_threshold_score,
        );
        let changed_accuracy = trained_model_score - production_model_score.unwrap_or(0.0);
        info!(
            trained_model_score,
            production_model_score = ?production_model_score,
            changed_accuracy,
            threshold = self.config.changed_threshold_score,
            accepted,
            "Evaluated candidate model"
        );

        Ok(ModelEvaluationArtifact {
            is_model_accepted: accepted,
            changed_accuracy,
            trained_model_score,
            production_model_score,
            trained_model_path: path.clone(),
            s3_model_path: self.config.s3_model_key_path.clone(),
        })
    }
}

#[async_trait]
impl Stage for ModelEvaluation<'_> {
    type Artifact = ModelEvaluationArtifact;

    fn kind(&self) -> StageKind {
        StageKind::Evaluation
    }

    async fn execute(&self) -> Result<ModelEvaluationArtifact, StageError> {
        self.run().await.map_err(StageError::Evaluation)
    }
}
