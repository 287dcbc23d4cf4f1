//! In-memory connectors.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::connectors::{Connectors, DocumentStore, ObjectStorage, Record};
use crate::errors::StorageError;

/// Document store backed by a map of collections.
///
/// Unknown collections read as empty, like a fresh MongoDB collection.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Record>>>,
    fetches: AtomicUsize,
    closed: AtomicBool,
}

impl InMemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding one collection.
    #[must_use]
    pub fn with_collection(name: impl Into<String>, records: Vec<Record>) -> Self {
        let store = Self::new();
        store.insert(name, records);
        store
    }

    /// Replaces a collection.
    pub fn insert(&self, name: impl Into<String>, records: Vec<Record>) {
        self.collections.write().insert(name.into(), records);
    }

    /// Number of fetches served.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// True once `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn fetch_collection(&self, collection: &str) -> Result<Vec<Record>, StorageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Object storage backed by a map of `(bucket, key)` to bytes.
#[derive(Debug, Default)]
pub struct InMemoryObjectStorage {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
    puts: AtomicUsize,
    closed: AtomicBool,
}

impl InMemoryObjectStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes stored under `bucket/key`.
    #[must_use]
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of successful uploads.
    #[must_use]
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// True once `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn put_object(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.objects
            .write()
            .insert((bucket.to_string(), key.to_string()), bytes);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.object(bucket, key).ok_or_else(|| StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// In-memory connectors plus handles for inspecting them.
#[derive(Debug, Clone)]
pub struct InMemoryConnectors {
    /// The bundle to hand to the pipeline.
    pub connectors: Connectors,
    /// The document store inside `connectors`.
    pub documents: Arc<InMemoryDocumentStore>,
    /// The object storage inside `connectors`.
    pub objects: Arc<InMemoryObjectStorage>,
}

impl InMemoryConnectors {
    /// Serves `records` from `collection`, with empty object storage.
    #[must_use]
    pub fn new(collection: &str, records: Vec<Record>) -> Self {
        Self::with_objects(collection, records, Arc::new(InMemoryObjectStorage::new()))
    }

    /// Serves `records` from `collection`, sharing an existing object storage.
    #[must_use]
    pub fn with_objects(
        collection: &str,
        records: Vec<Record>,
        objects: Arc<InMemoryObjectStorage>,
    ) -> Self {
        let documents = Arc::new(InMemoryDocumentStore::with_collection(collection, records));
        let connectors = Connectors::new(documents.clone(), objects.clone());
        Self {
            connectors,
            documents,
            objects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_document_store() {
        let store = InMemoryDocumentStore::with_collection("c", vec![Record::new()]);
        assert_eq!(store.fetch_collection("c").await.unwrap().len(), 1);
        assert!(store.fetch_collection("other").await.unwrap().is_empty());
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_object_storage() {
        let storage = InMemoryObjectStorage::new();
        assert!(storage.get_object("b", "k").await.unwrap_err().is_not_found());
        storage.put_object("b", "k", vec![1, 2]).await.unwrap();
        assert_eq!(storage.get_object("b", "k").await.unwrap(), vec![1, 2]);
        assert_eq!(storage.put_count(), 1);
    }

    #[tokio::test]
    async fn test_close_reaches_both() {
        let fakes = InMemoryConnectors::new("c", Vec::new());
        fakes.connectors.close().await;
        assert!(fakes.documents.is_closed());
        assert!(fakes.objects.is_closed());
    }
}
