//! Database capability consumed by the engine.
//!
//! The traits are operation-shaped: transport and protocol details belong to
//! the implementation (see the `liveness-mongodb` crate, or
//! [`MemoryDatabase`](crate::memory::MemoryDatabase) for tests and dry runs).

use crate::error::StoreError;
use async_trait::async_trait;
use bson::Document;
use std::sync::Arc;

/// A handle to a database deployment, safe for concurrent use.
#[async_trait]
pub trait Database: Send + Sync {
    /// Select a collection. Selection is lazy and does not touch the server.
    fn collection(&self, db: &str, name: &str) -> Arc<dyn Collection>;

    /// Run a minimal administrative liveness command.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Operations the workload issues against a single collection.
#[async_trait]
pub trait Collection: Send + Sync {
    /// `db.collection` name, for logging.
    fn namespace(&self) -> String;

    /// Ensure an ascending index on `field` named `name` exists.
    async fn ensure_index(&self, field: &str, name: &str) -> Result<(), StoreError>;

    /// Approximate document count (metadata based where the backend allows).
    async fn estimated_count(&self) -> Result<u64, StoreError>;

    /// Point read matching every field of `filter`.
    async fn find_one(&self, filter: Document) -> Result<Option<Document>, StoreError>;

    async fn insert_one(&self, doc: Document) -> Result<(), StoreError>;

    /// Unordered batch insert. Returns the number of documents written.
    async fn insert_many(&self, docs: Vec<Document>) -> Result<u64, StoreError>;

    /// Increment `inc_field` by one and set `set` on the document matching
    /// `filter`, inserting it when absent.
    async fn upsert_increment(
        &self,
        filter: Document,
        inc_field: &str,
        set: Document,
    ) -> Result<(), StoreError>;
}
