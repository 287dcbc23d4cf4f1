//! MongoDB document store.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::Client;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{DocumentStore, Record};
use crate::config::DatabaseSettings;
use crate::errors::{ConfigError, StorageError};

/// Reads collections from MongoDB.
///
/// The client is created on the first fetch and verified with a `ping`;
/// later fetches reuse it.
pub struct MongoDocumentStore {
    settings: DatabaseSettings,
    client: Mutex<Option<Client>>,
}

impl MongoDocumentStore {
    /// Creates an unconnected store.
    #[must_use]
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            settings,
            client: Mutex::new(None),
        }
    }

    async fn client(&self) -> Result<Client, StorageError> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let url = self.settings.url()?;
        let mut options = ClientOptions::parse(url.expose()).await.map_err(|e| {
            StorageError::Configuration(ConfigError::invalid(
                "DATABASE_URL",
                "***",
                e.to_string(),
            ))
        })?;
        options.app_name = Some("trainflow".to_string());

        let target = options
            .hosts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let connection_error = |e: mongodb::error::Error| StorageError::Connection {
            target: target.clone(),
            source: Box::new(e),
        };

        let client = Client::with_options(options).map_err(connection_error)?;
        client
            .database(&self.settings.name)
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(connection_error)?;

        info!(target = %target, database = %self.settings.name, "Connected to document store");
        *guard = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn fetch_collection(&self, collection: &str) -> Result<Vec<Record>, StorageError> {
        let client = self.client().await?;
        let query_error = |e: mongodb::error::Error| StorageError::Query {
            collection: collection.to_string(),
            source: Box::new(e),
        };

        let cursor = client
            .database(&self.settings.name)
            .collection::<Document>(collection)
            .find(None, None)
            .await
            .map_err(query_error)?;
        let documents: Vec<Document> = cursor.try_collect().await.map_err(query_error)?;

        debug!(collection = %collection, count = documents.len(), "Fetched documents");
        Ok(documents.into_iter().map(document_to_record).collect())
    }

    async fn close(&self) {
        if let Some(client) = self.client.lock().await.take() {
            client.shutdown().await;
            debug!("Document store client shut down");
        }
    }
}

fn document_to_record(document: Document) -> Record {
    match Bson::Document(document).into_relaxed_extjson() {
        serde_json::Value::Object(map) => map,
        _ => Record::new(),
    }
}
