//! In-memory stores for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    BlobStore, CREATED_AT, Direction, Document, DocumentStore, Fields, OrderBy, compare_values, generate_id,
    server_timestamp, union_into, validate_field,
};
use crate::error::{ObjectStorageError, StoreError};

/// Document store held in a `HashMap` of collections behind a [`RwLock`].
///
/// Every trait call is counted, and writes can be made to fail after a
/// given number of successes with [`MemoryStore::fail_writes_after`].
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    calls: AtomicUsize,
    writes: AtomicUsize,
    fail_after: std::sync::Mutex<Option<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a document with a fixed id, bypassing call accounting.
    pub async fn seed(&self, collection: &str, id: &str, fields: Fields) {
        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().push(Document {
            id: id.to_string(),
            fields,
        });
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Lets `n` further writes through, then rejects every write.
    pub fn fail_writes_after(&self, n: usize) {
        let done = self.writes.load(Ordering::SeqCst);
        if let Ok(mut limit) = self.fail_after.lock() {
            *limit = Some(done + n);
        }
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn admit_write(&self) -> Result<(), StoreError> {
        let limit = self
            .fail_after
            .lock()
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        let done = self.writes.load(Ordering::SeqCst);
        if limit.is_some_and(|limit| done >= limit) {
            return Err(StoreError::Rejected("injected write failure".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_document(&self, collection: &str, mut fields: Fields) -> Result<String, StoreError> {
        self.record_call();
        self.admit_write()?;

        let id = generate_id(collection);
        fields.insert(CREATED_AT.to_string(), server_timestamp().into());

        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(Document { id: id.clone(), fields });
        Ok(id)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.record_call();
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn list_documents(&self, collection: &str, order: Option<&OrderBy>) -> Result<Vec<Document>, StoreError> {
        self.record_call();
        let collections = self.collections.read().await;
        let mut docs = collections.get(collection).cloned().unwrap_or_default();

        if let Some(order) = order {
            validate_field(&order.field)?;
            docs.retain(|d| d.fields.contains_key(&order.field));
            // stable sort keeps insertion order among equal keys
            docs.sort_by(|a, b| {
                let ord = compare_values(&a.fields[&order.field], &b.fields[&order.field]);
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }
        Ok(docs)
    }

    async fn union_merge(&self, collection: &str, id: &str, field: &str, values: &[String]) -> Result<(), StoreError> {
        self.record_call();
        validate_field(field)?;
        self.admit_write()?;

        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        union_into(&mut doc.fields, field, values)?;
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.record_call();
        self.admit_write()?;

        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| d.id != id);
        Ok(docs.len() != before)
    }
}

/// Blob store keeping uploads in memory under `mem://` URLs.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    fail_deletes: std::sync::atomic::AtomicBool,
}

impl MemoryBlobStore {
    const SCHEME: &'static str = "mem://";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.blobs.read().await.contains_key(url)
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, _content_type: Option<&str>) -> Result<String, ObjectStorageError> {
        if path.is_empty() {
            return Err(ObjectStorageError::InvalidKey(path.to_string()));
        }
        let url = format!("{}{}", Self::SCHEME, path);
        self.blobs.write().await.insert(url.clone(), bytes);
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), ObjectStorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ObjectStorageError::S3Error("injected delete failure".into()));
        }
        if !url.starts_with(Self::SCHEME) {
            return Err(ObjectStorageError::ForeignUrl(url.to_string()));
        }
        match self.blobs.write().await.remove(url) {
            Some(_) => Ok(()),
            None => Err(ObjectStorageError::NotFound(url.to_string())),
        }
    }
}
