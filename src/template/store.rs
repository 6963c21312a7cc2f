//! # Store driver boundary.
//!
//! [`Store`] is the async interface to the physical store. The pipeline only
//! needs three operations: acknowledged write, point read by `_id`, and a full
//! collection scan.
//!
//! [`MemoryStore`] keeps documents in memory, keyed by collection and `_id`. A
//! document written without `_id` gets a generated one, returned in the
//! acknowledged copy.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::entity::Document;
use crate::error::StoreError;

/// Async document store.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Writes (inserts or replaces) a document and returns the acknowledged copy.
    async fn write(&self, collection: &str, document: Document) -> Result<Document, StoreError>;

    /// Reads the document with `_id == id`.
    async fn read(&self, collection: &str, id: &Value) -> Result<Option<Document>, StoreError>;

    /// Every document of `collection`, in `_id` order.
    async fn scan(&self, collection: &str) -> Result<Vec<Document>, StoreError>;
}

/// In-memory [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<DocKey, Document>>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

/// Map key for an `_id` value, tagged with its JSON type.
///
/// The string `"1"` and the number `1` are different documents. Integers sort
/// numerically and before strings.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum DocKey {
    Int(i128),
    Float(String),
    Text(String),
}

fn key_of(id: &Value) -> Result<DocKey, StoreError> {
    match id {
        Value::String(s) => Ok(DocKey::Text(s.clone())),
        Value::Number(n) => Ok(n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .map_or_else(|| DocKey::Float(n.to_string()), DocKey::Int)),
        other => Err(StoreError(format!("unsupported _id: {other}"))),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn write(&self, collection: &str, mut document: Document) -> Result<Document, StoreError> {
        let key = match document.get("_id") {
            Some(id) if !id.is_null() => key_of(id)?,
            _ => {
                let generated = format!("{:08}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
                document.insert("_id".into(), Value::String(generated.clone()));
                DocKey::Text(generated)
            }
        };

        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(key, document.clone());
        Ok(document)
    }

    async fn read(&self, collection: &str, id: &Value) -> Result<Option<Document>, StoreError> {
        let key = key_of(id)?;
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|c| c.get(&key))
            .cloned())
    }

    async fn scan(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }
}
