//! S3-compatible object storage backed by the `object_store` crate.

use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::ObjectStorage;
use crate::config::ObjectStoreSettings;
use crate::errors::StorageError;

type StoreFactory = dyn Fn(&str) -> Result<Arc<dyn ObjectStore>, StorageError> + Send + Sync;

/// Object storage with one client per bucket, created on first use.
pub struct CloudObjectStorage {
    factory: Box<StoreFactory>,
    stores: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl CloudObjectStorage {
    /// Uses S3 with the configured region, keys and optional endpoint.
    #[must_use]
    pub fn new(settings: ObjectStoreSettings) -> Self {
        Self::with_factory(move |bucket| build_s3(&settings, bucket))
    }

    /// Uses a custom store per bucket (e.g. `object_store::memory::InMemory`).
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Result<Arc<dyn ObjectStore>, StorageError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            stores: Mutex::new(HashMap::new()),
        }
    }

    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(bucket) {
            return Ok(Arc::clone(store));
        }
        let store = (self.factory)(bucket)?;
        stores.insert(bucket.to_string(), Arc::clone(&store));
        Ok(store)
    }
}

fn build_s3(settings: &ObjectStoreSettings, bucket: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
    let credentials = settings.credentials().map_err(StorageError::Credential)?;

    let mut builder = AmazonS3Builder::new()
        .with_region(&settings.region)
        .with_bucket_name(bucket)
        .with_access_key_id(credentials.access_key_id.expose())
        .with_secret_access_key(credentials.secret_access_key.expose());
    if let Some(endpoint) = &settings.endpoint {
        builder = builder.with_endpoint(endpoint).with_allow_http(true);
    }

    let store = builder.build().map_err(|e| StorageError::Connection {
        target: format!("s3://{bucket}"),
        source: Box::new(e),
    })?;
    info!(bucket = %bucket, region = %settings.region, "Created object store client");
    Ok(Arc::new(store))
}

#[async_trait]
impl ObjectStorage for CloudObjectStorage {
    async fn put_object(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let store = self.store(bucket)?;
        let size = bytes.len();
        store
            .put(&Path::from(key), PutPayload::from(bytes))
            .await
            .map_err(|e| StorageError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: Box::new(e),
            })?;
        debug!(bucket = %bucket, key = %key, size, "Uploaded object");
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let store = self.store(bucket)?;
        let download_error = |e: object_store::Error| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            other => StorageError::Download {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: Box::new(other),
            },
        };

        let result = store.get(&Path::from(key)).await.map_err(download_error)?;
        let bytes = result.bytes().await.map_err(download_error)?;
        debug!(bucket = %bucket, key = %key, size = bytes.len(), "Downloaded object");
        Ok(bytes.to_vec())
    }

    async fn close(&self) {
        self.stores.lock().clear();
    }
}
