//! Storage connectors.
//!
//! Connectors are built once by the entry point and handed to the
//! orchestrator, which closes them when the run ends. Stages only see the
//! traits.

pub mod mongo;
pub mod s3;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::config::Settings;
use crate::errors::StorageError;

pub use self::mongo::MongoDocumentStore;
pub use self::s3::CloudObjectStorage;

/// One document as a JSON object.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Read access to a document store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns every document of `collection`.
    async fn fetch_collection(&self, collection: &str) -> Result<Vec<Record>, StorageError>;

    /// Releases the underlying client. Safe to call more than once.
    async fn close(&self) {}
}

/// Put/get access to an object store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` under `bucket/key`, overwriting any existing object.
    async fn put_object(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    /// Fetches `bucket/key`. Fails with [`StorageError::NotFound`] when absent.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Releases cached clients. Safe to call more than once.
    async fn close(&self) {}
}

/// The connectors a run needs.
#[derive(Clone)]
pub struct Connectors {
    /// Source of training records.
    pub documents: Arc<dyn DocumentStore>,
    /// Model registry.
    pub objects: Arc<dyn ObjectStorage>,
}

impl Connectors {
    /// Bundles two connectors.
    pub fn new(documents: Arc<dyn DocumentStore>, objects: Arc<dyn ObjectStorage>) -> Self {
        Self { documents, objects }
    }

    /// Builds the MongoDB and S3 connectors. Nothing connects until first use.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Arc::new(MongoDocumentStore::new(settings.database.clone())),
            Arc::new(CloudObjectStorage::new(settings.object_store.clone())),
        )
    }

    /// Closes both connectors.
    pub async fn close(&self) {
        self.documents.close().await;
        self.objects.close().await;
    }
}

impl fmt::Debug for Connectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connectors").finish_non_exhaustive()
    }
}
