//! Fits the classifier and gates it on test accuracy.

use async_trait::async_trait;
use tracing::info;

use super::Stage;
use crate::core::StageKind;
use crate::entities::{DataTransformationArtifact, ModelTrainerArtifact, ModelTrainerConfig};
use crate::errors::{FailureCause, StageError};
use crate::ml::{ClassificationMetrics, EncodedPartition, Preprocessor, RandomForestClassifier, TrainedModel};
use crate::utils::{read_json, write_bytes};

/// Trains a random forest on the encoded train partition.
pub struct ModelTrainer<'a> {
    config: &'a ModelTrainerConfig,
    transformation: &'a DataTransformationArtifact,
}

impl<'a> ModelTrainer<'a> {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        config: &'a ModelTrainerConfig,
        transformation: &'a DataTransformationArtifact,
    ) -> Self {
        Self {
            config,
            transformation,
        }
    }

    /// Fits the forest and scores it on the test partition.
    pub fn get_model_object_and_report(
        &self,
        train: &EncodedPartition,
        test: &EncodedPartition,
    ) -> Result<(RandomForestClassifier, ClassificationMetrics), FailureCause> {
        let classifier = RandomForestClassifier::fit(
            train.features.view(),
            train.labels.view(),
            self.config.params.clone(),
        )?;
        let predicted = classifier.predict(test.features.view())?;
        let metrics = ClassificationMetrics::compute(&test.labels.to_vec(), &predicted.to_vec());
        Ok((classifier, metrics))
    }

    fn run(&self) -> Result<ModelTrainerArtifact, FailureCause> {
        let train: EncodedPartition = read_json(&self.transformation.transformed_train_file_path)?;
        let test: EncodedPartition = read_json(&self.transformation.transformed_test_file_path)?;
        let preprocessor: Preprocessor =
            read_json(&self.transformation.transformed_object_file_path)?;

        let (classifier, metrics) = self.get_model_object_and_report(&train, &test)?;
        info!(
            trees = classifier.n_trees(),
            accuracy = metrics.accuracy,
            f1 = metrics.f1_score,
            precision = metrics.precision_score,
            recall = metrics.recall_score,
            "Trained classifier"
        );

        if metrics.accuracy < self.config.expected_accuracy {
            return Err(FailureCause::BelowExpectedAccuracy {
                accuracy: metrics.accuracy,
                expected: self.config.expected_accuracy,
            });
        }

        let model = TrainedModel::new(preprocessor, classifier);
        let path = &self.config.trained_model_file_path;
        let bytes = model.to_bytes().map_err(|source| FailureCause::Json {
            path: path.clone(),
            source,
        })?;
        write_bytes(path, &bytes)?;

        Ok(ModelTrainerArtifact {
            trained_model_file_path: path.clone(),
            metric_artifact: metrics,
        })
    }
}

#[async_trait]
impl Stage for ModelTrainer<'_> {
    type Artifact = ModelTrainerArtifact;

    fn kind(&self) -> StageKind {
        StageKind::Training
    }

    async fn execute(&self) -> Result<ModelTrainerArtifact, StageError> {
        self.run().map_err(StageError::Training)
    }
}
