//! Exports a collection into the feature store and splits it.

use async_trait::async_trait;
use tracing::{debug, info};

use super::Stage;
use crate::connectors::DocumentStore;
use crate::core::StageKind;
use crate::data::Table;
use crate::entities::{DataIngestionArtifact, DataIngestionConfig};
use crate::errors::{ConfigError, FailureCause, StageError};

/// Column added by the document store.
const STORE_ID_COLUMN: &str = "_id";

/// Pulls every record of the configured collection.
pub struct DataIngestion<'a> {
    config: &'a DataIngestionConfig,
    documents: &'a dyn DocumentStore,
}

impl<'a> DataIngestion<'a> {
    /// Creates the stage.
    #[must_use]
    pub fn new(config: &'a DataIngestionConfig, documents: &'a dyn DocumentStore) -> Self {
        Self { config, documents }
    }

    fn check_ratio(&self) -> Result<(), ConfigError> {
        let ratio = self.config.train_test_split_ratio;
        if ratio > 0.0 && ratio < 1.0 {
            Ok(())
        } else {
            Err(ConfigError::invalid(
                "DATA_INGESTION_TRAIN_TEST_SPLIT_RATIO",
                ratio.to_string(),
                "must be strictly between 0 and 1",
            ))
        }
    }

    /// Fetches the collection and writes it to the feature store.
    ///
    /// Nothing is written unless the fetch succeeds.
    pub async fn export_data_into_feature_store(&self) -> Result<Table, FailureCause> {
        let collection = &self.config.collection_name;
        let records = self.documents.fetch_collection(collection).await?;

        let mut table = Table::from_records(&records);
        table.drop_column(STORE_ID_COLUMN);
        if table.len() < 2 {
            return Err(FailureCause::EmptyDataset {
                name: collection.clone(),
                rows: table.len(),
                required: 2,
            });
        }

        table.write_csv(&self.config.feature_store_file_path)?;
        info!(
            collection = %collection,
            rows = table.len(),
            columns = table.columns().len(),
            path = %self.config.feature_store_file_path.display(),
            "Exported collection to feature store"
        );
        Ok(table)
    }

    /// Splits the table and writes both partitions.
    pub fn split_data_as_train_test(&self, table: &Table) -> Result<(Table, Table), FailureCause> {
        let (train, test) = table.split(self.config.train_test_split_ratio, self.config.split_seed);
        train.write_csv(&self.config.training_file_path)?;
        test.write_csv(&self.config.testing_file_path)?;
        debug!(train_rows = train.len(), test_rows = test.len(), "Wrote train/test partitions");
        Ok((train, test))
    }

    async fn run(&self) -> Result<DataIngestionArtifact, FailureCause> {
        self.check_ratio()?;
        let table = self.export_data_into_feature_store().await?;
        let (train, test) = self.split_data_as_train_test(&table)?;

        Ok(DataIngestionArtifact {
            feature_store_file_path: self.config.feature_store_file_path.clone(),
            trained_file_path: self.config.training_file_path.clone(),
            test_file_path: self.config.testing_file_path.clone(),
            total_rows: table.len(),
            train_rows: train.len(),
            test_rows: test.len(),
        })
    }
}

#[async_trait]
impl Stage for DataIngestion<'_> {
    type Artifact = DataIngestionArtifact;

    fn kind(&self) -> StageKind {
        StageKind::Ingestion
    }

    async fn execute(&self) -> Result<DataIngestionArtifact, StageError> {
        self.run().await.map_err(StageError::Ingestion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::MockDocumentStore;
    use crate::core::RunIdentity;
    use crate::entities::StageConfigs;
    use crate::errors::StorageError;
    use crate::testing::fixtures::{insurance_records, test_settings, COLLECTION};
    use crate::testing::InMemoryDocumentStore;

    fn config(root: &std::path::Path, overrides: &[(&str, &str)]) -> DataIngestionConfig {
        let settings = test_settings(root, overrides);
        StageConfigs::new(&settings, &RunIdentity::with_timestamp("run")).ingestion
    }

    #[tokio::test]
    async fn test_splits_and_writes_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &[]);
        let store = InMemoryDocumentStore::with_collection(COLLECTION, insurance_records(100, 1));

        let artifact = DataIngestion::new(&config, &store).execute().await.unwrap();
        assert_eq!(artifact.total_rows, 100);
        assert_eq!(artifact.train_rows, 75);
        assert_eq!(artifact.test_rows, 25);
        assert!(artifact.feature_store_file_path.exists());

        let train = Table::read_csv(&artifact.trained_file_path).unwrap();
        assert_eq!(train.len(), 75);
        assert!(train.column_index("_id").is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &[]);
        let mut store = MockDocumentStore::new();
        store.expect_fetch_collection().times(1).returning(|c| {
            Err(StorageError::Query {
                collection: c.to_string(),
                source: "cursor died".into(),
            })
        });

        let err = DataIngestion::new(&config, &store).execute().await.unwrap_err();
        assert_eq!(err.kind(), StageKind::Ingestion);
        assert!(matches!(err.cause(), FailureCause::Storage(StorageError::Query { .. })));
        assert!(!config.data_ingestion_dir.exists());
    }

    #[tokio::test]
    async fn test_invalid_ratio_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &[("DATA_INGESTION_TRAIN_TEST_SPLIT_RATIO", "1.0")]);
        let mut store = MockDocumentStore::new();
        store.expect_fetch_collection().never();

        let err = DataIngestion::new(&config, &store).execute().await.unwrap_err();
        assert!(matches!(err.cause(), FailureCause::Config(ConfigError::Invalid { .. })));
    }

    #[tokio::test]
    async fn test_too_few_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &[]);
        let store = InMemoryDocumentStore::with_collection(COLLECTION, insurance_records(1, 1));

        let err = DataIngestion::new(&config, &store).execute().await.unwrap_err();
        assert!(matches!(err.cause(), FailureCause::EmptyDataset { rows: 1, .. }));
        assert!(!config.feature_store_file_path.exists());
    }
}
