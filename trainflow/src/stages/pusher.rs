//! Publishes the accepted model to the model registry bucket.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::info;

use super::Stage;
use crate::connectors::ObjectStorage;
use crate::core::StageKind;
use crate::entities::{ModelEvaluationArtifact, ModelPusherArtifact, ModelPusherConfig};
use crate::errors::{FailureCause, StageError};
use crate::utils::read_bytes;

/// Uploads the candidate model, replacing the production one.
///
/// The orchestrator only builds this stage for accepted candidates. Local
/// artifacts are left in place whether or not the upload succeeds.
pub struct ModelPusher<'a> {
    config: &'a ModelPusherConfig,
    evaluation: &'a ModelEvaluationArtifact,
    objects: &'a dyn ObjectStorage,
}

impl<'a> ModelPusher<'a> {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        config: &'a ModelPusherConfig,
        evaluation: &'a ModelEvaluationArtifact,
        objects: &'a dyn ObjectStorage,
    ) -> Self {
        Self {
            config,
            evaluation,
            objects,
        }
    }

    async fn run(&self) -> Result<ModelPusherArtifact, FailureCause> {
        let bytes = read_bytes(&self.evaluation.trained_model_path)?;
        let model_sha256 = hex::encode(Sha256::digest(&bytes));
        let size_bytes = bytes.len();

        let bucket = &self.config.bucket_name;
        let key = &self.config.s3_model_key_path;
        self.objects.put_object(bucket, key, bytes).await?;
        info!(bucket = %bucket, key = %key, sha256 = %model_sha256, size_bytes, "Published model");

        Ok(ModelPusherArtifact {
            bucket_name: bucket.clone(),
            s3_model_path: key.clone(),
            model_sha256,
            size_bytes,
        })
    }
}

#[async_trait]
impl Stage for ModelPusher<'_> {
    type Artifact = ModelPusherArtifact;

    fn kind(&self) -> StageKind {
        StageKind::Publishing
    }

    async fn execute(&self) -> Result<ModelPusherArtifact, StageError> {
        self.run().await.map_err(StageError::Publish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::MockObjectStorage;
    use crate::errors::StorageError;
    use crate::testing::InMemoryObjectStorage;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn evaluation(dir: &Path) -> ModelEvaluationArtifact {
        let path = dir.join("model.json");
        std::fs::write(&path, b"{\"model\":true}").unwrap();
        ModelEvaluationArtifact {
            is_model_accepted: true,
            changed_accuracy: 0.1,
            trained_model_score: 0.9,
            production_model_score: Some(0.8),
            trained_model_path: path,
            s3_model_path: "model-registry/model.json".to_string(),
        }
    }

    fn config() -> ModelPusherConfig {
        ModelPusherConfig {
            bucket_name: "models".to_string(),
            s3_model_key_path: "model-registry/model.json".to_string(),
        }
    }

    #[tokio::test]
    async fn test_uploads_bytes_with_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let evaluation = evaluation(dir.path());
        let config = config();
        let objects = InMemoryObjectStorage::new();

        let artifact = ModelPusher::new(&config, &evaluation, &objects)
            .execute()
            .await
            .unwrap();
        assert_eq!(
            objects.object("models", "model-registry/model.json").unwrap(),
            b"{\"model\":true}".to_vec()
        );
        assert_eq!(artifact.size_bytes, 14);
        assert_eq!(artifact.model_sha256, hex::encode(Sha256::digest(b"{\"model\":true}")));
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_local_model() {
        let dir = tempfile::tempdir().unwrap();
        let evaluation = evaluation(dir.path());
        let config = config();
        let mut objects = MockObjectStorage::new();
        objects.expect_put_object().times(1).returning(|bucket, key, _| {
            Err(StorageError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: "access denied".into(),
            })
        });

        let err = ModelPusher::new(&config, &evaluation, &objects)
            .execute()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), StageKind::Publishing);
        assert!(evaluation.trained_model_path.exists());
    }
}
