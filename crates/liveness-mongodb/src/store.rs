//! MongoDB implementation of the engine's database capability.

use crate::error::MongoStoreError;
use async_trait::async_trait;
use bson::{doc, Document};
use liveness_engine::{Collection, Database, StoreError};
use mongodb::event::sdam::SdamEvent;
use mongodb::event::EventHandler;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, IndexModel};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Application name reported to the server.
pub const APP_NAME: &str = "mongodb-liveness";

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`MongoDatabase::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub uri: String,
    pub max_pool_size: u32,
}

/// A [`Database`] backed by a `mongodb::Client`.
#[derive(Debug, Clone)]
pub struct MongoDatabase {
    client: Client,
}

impl MongoDatabase {
    /// Build a client. Server selection happens lazily on first use.
    pub async fn connect(
        options: &ConnectOptions,
        sdam_handler: Option<EventHandler<SdamEvent>>,
    ) -> Result<Self, MongoStoreError> {
        let mut client_options = ClientOptions::parse(&options.uri).await?;
        client_options.app_name = Some(APP_NAME.to_string());
        client_options.max_pool_size = Some(options.max_pool_size);
        client_options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        client_options.retry_writes = Some(true);
        if let Some(handler) = sdam_handler {
            client_options.sdam_event_handler = Some(handler);
        }
        debug!(
            "MongoDB options parsed: max_pool_size={}, server_selection_timeout={:?}",
            options.max_pool_size, SERVER_SELECTION_TIMEOUT
        );

        let client = Client::with_options(client_options)?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Close the client, waiting for outstanding sessions and cursors.
    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }
}

#[async_trait]
impl Database for MongoDatabase {
    fn collection(&self, db: &str, name: &str) -> Arc<dyn Collection> {
        Arc::new(MongoCollection {
            inner: self.client.database(db).collection(name),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::backend("ping", e))?;
        Ok(())
    }
}

/// A [`Collection`] backed by `mongodb::Collection<Document>`.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    inner: mongodb::Collection<Document>,
}

#[async_trait]
impl Collection for MongoCollection {
    fn namespace(&self) -> String {
        self.inner.namespace().to_string()
    }

    async fn ensure_index(&self, field: &str, name: &str) -> Result<(), StoreError> {
        let model = IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(IndexOptions::builder().name(name.to_string()).build())
            .build();
        self.inner
            .create_index(model)
            .await
            .map_err(|e| StoreError::backend("create_index", e))?;
        Ok(())
    }

    async fn estimated_count(&self) -> Result<u64, StoreError> {
        self.inner
            .estimated_document_count()
            .await
            .map_err(|e| StoreError::backend("estimated_document_count", e))
    }

    async fn find_one(&self, filter: Document) -> Result<Option<Document>, StoreError> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| StoreError::backend("find_one", e))
    }

    async fn insert_one(&self, doc: Document) -> Result<(), StoreError> {
        self.inner
            .insert_one(doc)
            .await
            .map_err(|e| StoreError::backend("insert_one", e))?;
        Ok(())
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<u64, StoreError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let result = self
            .inner
            .insert_many(docs)
            .ordered(false)
            .await
            .map_err(|e| StoreError::backend("insert_many", e))?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn upsert_increment(
        &self,
        filter: Document,
        inc_field: &str,
        set: Document,
    ) -> Result<(), StoreError> {
        let update = doc! {
            "$inc": { inc_field: 1 },
            "$set": set,
        };
        self.inner
            .update_one(filter, update)
            .upsert(true)
            .await
            .map_err(|e| StoreError::backend("update_one", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_without_server() {
        let options = ConnectOptions {
            uri: "mongodb://127.0.0.1:1/?connectTimeoutMS=100".to_string(),
            max_pool_size: 2,
        };
        let db = MongoDatabase::connect(&options, None).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), db.shutdown())
            .await
            .expect("client shutdown should not wait for a server");
    }
}
