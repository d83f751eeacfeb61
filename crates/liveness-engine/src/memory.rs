//! In-memory implementation of the database capability.
//!
//! Used by the dry-run mode and by the engine tests. Supports per-operation
//! failure injection and call counting so tests can assert on failure
//! isolation without a live cluster.

use crate::error::StoreError;
use crate::store::{Collection, Database};
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Operations that can be counted and made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    EnsureIndex,
    Count,
    Find,
    Insert,
    InsertMany,
    Upsert,
    Ping,
}

impl fmt::Display for MemoryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemoryOp::EnsureIndex => "ensure_index",
            MemoryOp::Count => "estimated_count",
            MemoryOp::Find => "find_one",
            MemoryOp::Insert => "insert_one",
            MemoryOp::InsertMany => "insert_many",
            MemoryOp::Upsert => "upsert",
            MemoryOp::Ping => "ping",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum Injected {
    Always,
    Times(u64),
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, Vec<Document>>,
    indexes: HashMap<String, Vec<String>>,
    failures: HashMap<MemoryOp, Injected>,
    calls: HashMap<MemoryOp, u64>,
}

impl MemoryState {
    /// Count the call and consume one injected failure, if any.
    fn enter(&mut self, op: MemoryOp) -> Result<(), StoreError> {
        *self.calls.entry(op).or_default() += 1;

        let fail = match self.failures.get_mut(&op) {
            None => false,
            Some(Injected::Always) => true,
            Some(Injected::Times(0)) => false,
            Some(Injected::Times(n)) => {
                *n -= 1;
                true
            }
        };

        if fail {
            Err(StoreError::Unavailable(format!("injected {op} failure")))
        } else {
            Ok(())
        }
    }
}

/// A process-local database. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `op` call fail until [`recover`](Self::recover).
    pub fn fail(&self, op: MemoryOp) {
        self.lock().failures.insert(op, Injected::Always);
    }

    /// Make the next `times` calls of `op` fail.
    pub fn fail_times(&self, op: MemoryOp, times: u64) {
        self.lock().failures.insert(op, Injected::Times(times));
    }

    pub fn recover(&self, op: MemoryOp) {
        self.lock().failures.remove(&op);
    }

    /// Number of times `op` has been called, failed calls included.
    pub fn calls(&self, op: MemoryOp) -> u64 {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Snapshot of a collection's documents in insertion order.
    pub fn documents(&self, db: &str, name: &str) -> Vec<Document> {
        self.lock()
            .collections
            .get(&namespace(db, name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self, db: &str, name: &str) -> usize {
        self.lock()
            .collections
            .get(&namespace(db, name))
            .map_or(0, Vec::len)
    }

    /// Names of the indexes created on a collection.
    pub fn indexes(&self, db: &str, name: &str) -> Vec<String> {
        self.lock()
            .indexes
            .get(&namespace(db, name))
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    fn collection(&self, db: &str, name: &str) -> Arc<dyn Collection> {
        Arc::new(MemoryCollection {
            namespace: namespace(db, name),
            state: self.state.clone(),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().enter(MemoryOp::Ping)
    }
}

/// A collection inside a [`MemoryDatabase`].
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    namespace: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryCollection {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    async fn ensure_index(&self, _field: &str, name: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.enter(MemoryOp::EnsureIndex)?;

        let indexes = state.indexes.entry(self.namespace.clone()).or_default();
        if !indexes.iter().any(|existing| existing == name) {
            indexes.push(name.to_string());
        }
        Ok(())
    }

    async fn estimated_count(&self) -> Result<u64, StoreError> {
        let mut state = self.lock();
        state.enter(MemoryOp::Count)?;
        Ok(state
            .collections
            .get(&self.namespace)
            .map_or(0, |docs| docs.len() as u64))
    }

    async fn find_one(&self, filter: Document) -> Result<Option<Document>, StoreError> {
        let mut state = self.lock();
        state.enter(MemoryOp::Find)?;
        Ok(state
            .collections
            .get(&self.namespace)
            .and_then(|docs| docs.iter().find(|doc| matches_filter(doc, &filter)))
            .cloned())
    }

    async fn insert_one(&self, doc: Document) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.enter(MemoryOp::Insert)?;
        state
            .collections
            .entry(self.namespace.clone())
            .or_default()
            .push(with_id(doc));
        Ok(())
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<u64, StoreError> {
        let mut state = self.lock();
        state.enter(MemoryOp::InsertMany)?;

        let inserted = docs.len() as u64;
        state
            .collections
            .entry(self.namespace.clone())
            .or_default()
            .extend(docs.into_iter().map(with_id));
        Ok(inserted)
    }

    async fn upsert_increment(
        &self,
        filter: Document,
        inc_field: &str,
        set: Document,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.enter(MemoryOp::Upsert)?;

        let docs = state.collections.entry(self.namespace.clone()).or_default();
        match docs.iter_mut().find(|doc| matches_filter(doc, &filter)) {
            Some(doc) => {
                let incremented = increment(doc.get(inc_field), inc_field)?;
                doc.insert(inc_field, incremented);
                for (key, value) in set {
                    doc.insert(key, value);
                }
            }
            None => {
                let mut doc = filter;
                doc.insert(inc_field, Bson::Int32(1));
                for (key, value) in set {
                    doc.insert(key, value);
                }
                docs.push(with_id(doc));
            }
        }
        Ok(())
    }
}

fn namespace(db: &str, name: &str) -> String {
    format!("{db}.{name}")
}

fn with_id(mut doc: Document) -> Document {
    if !doc.contains_key("_id") {
        doc.insert("_id", ObjectId::new());
    }
    doc
}

/// Equality on every filter field; numeric types compare by value.
fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| match doc.get(key) {
        Some(actual) => values_equal(actual, expected),
        None => false,
    })
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn increment(current: Option<&Bson>, field: &str) -> Result<Bson, StoreError> {
    match current {
        None => Ok(Bson::Int32(1)),
        Some(Bson::Int32(v)) => Ok(match v.checked_add(1) {
            Some(next) => Bson::Int32(next),
            None => Bson::Int64(i64::from(*v) + 1),
        }),
        Some(Bson::Int64(v)) => Ok(Bson::Int64(v.saturating_add(1))),
        Some(Bson::Double(v)) => Ok(Bson::Double(v + 1.0)),
        Some(other) => Err(StoreError::InvalidDocument(format!(
            "cannot increment non-numeric field '{field}' ({:?})",
            other.element_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn test_insert_and_find() {
        let db = MemoryDatabase::new();
        let coll = db.collection("liveness", "probe");

        coll.insert_one(doc! { "k": 7_i64, "location": "US", "n": 0_i64 })
            .await
            .unwrap();

        // Int32 filter matches Int64 stored value.
        let found = coll
            .find_one(doc! { "k": 7, "location": "US" })
            .await
            .unwrap()
            .expect("document should match");
        assert!(found.contains_key("_id"));

        let missing = coll.find_one(doc! { "k": 7, "location": "DE" }).await.unwrap();
        assert!(missing.is_none());
        assert_eq!(coll.namespace(), "liveness.probe");
    }

    #[tokio::test]
    async fn test_insert_many_and_count() {
        let db = MemoryDatabase::new();
        let coll = db.collection("liveness", "probe");

        let docs = (0..5).map(|k| doc! { "k": k }).collect();
        assert_eq!(coll.insert_many(docs).await.unwrap(), 5);
        assert_eq!(coll.estimated_count().await.unwrap(), 5);
        assert_eq!(db.len("liveness", "probe"), 5);
        assert_eq!(db.len("liveness", "other"), 0);
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_increments() {
        let db = MemoryDatabase::new();
        let coll = db.collection("liveness", "probe");

        coll.upsert_increment(doc! { "k": 1, "location": "FR" }, "n", doc! { "ts": 1 })
            .await
            .unwrap();
        coll.upsert_increment(doc! { "k": 1, "location": "FR" }, "n", doc! { "ts": 2 })
            .await
            .unwrap();

        let docs = db.documents("liveness", "probe");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_i32("n").unwrap(), 2);
        assert_eq!(docs[0].get_i32("ts").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_increment_rejects_non_numeric() {
        let db = MemoryDatabase::new();
        let coll = db.collection("liveness", "probe");
        coll.insert_one(doc! { "k": 1, "n": "zero" }).await.unwrap();

        let err = coll
            .upsert_increment(doc! { "k": 1 }, "n", Document::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let db = MemoryDatabase::new();
        let coll = db.collection("liveness", "probe");

        db.fail_times(MemoryOp::Insert, 2);
        assert!(coll.insert_one(doc! { "k": 1 }).await.is_err());
        assert!(coll.insert_one(doc! { "k": 2 }).await.is_err());
        assert!(coll.insert_one(doc! { "k": 3 }).await.is_ok());

        db.fail(MemoryOp::Ping);
        assert!(db.ping().await.is_err());
        assert!(db.ping().await.is_err());
        db.recover(MemoryOp::Ping);
        assert!(db.ping().await.is_ok());

        assert_eq!(db.calls(MemoryOp::Insert), 3);
        assert_eq!(db.calls(MemoryOp::Ping), 3);
        assert_eq!(db.len("liveness", "probe"), 1);
    }

    #[tokio::test]
    async fn test_ensure_index_is_idempotent() {
        let db = MemoryDatabase::new();
        let coll = db.collection("liveness", "probe");

        coll.ensure_index("k", "k_1").await.unwrap();
        coll.ensure_index("k", "k_1").await.unwrap();
        assert_eq!(db.indexes("liveness", "probe"), vec!["k_1".to_string()]);
    }
}
