//! Document and blob store seams.
//!
//! The console never talks to a concrete backend directly. Everything goes
//! through [`DocumentStore`] (schemaless JSON documents grouped into named
//! collections) and [`BlobStore`] (bytes addressed by path, handed back as a
//! public URL). `crate::db::Database` and `crate::s3::ObjectStorage` are the
//! production implementations; the in-memory ones live in [`memory`].

#[cfg(any(test, feature = "mock"))]
pub mod memory;

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{ObjectStorageError, StoreError};

pub type Fields = Map<String, Value>;

pub const CREATED_AT: &str = "createdAt";

const ID_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Decodes the document into a typed record. The document id is exposed
    /// to the record as an `id` field.
    pub fn decode<T: DeserializeOwned>(self, collection: &str) -> Result<T, StoreError> {
        let Document { id, mut fields } = self;
        fields.insert("id".to_string(), Value::String(id.clone()));
        serde_json::from_value(Value::Object(fields)).map_err(|e| StoreError::Malformed {
            collection: collection.to_string(),
            id,
            reason: e.to_string(),
        })
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Desc,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores a new document and returns its generated id. `createdAt` is
    /// always stamped by the store, overriding any caller-supplied value.
    async fn create_document(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Lists a collection. With an order, documents lacking the order field
    /// are left out; ties keep insertion order.
    async fn list_documents(&self, collection: &str, order: Option<&OrderBy>) -> Result<Vec<Document>, StoreError>;

    /// Adds `values` to the array held in `field` without duplicating or
    /// dropping existing elements. Each call is applied atomically.
    async fn union_merge(&self, collection: &str, id: &str, field: &str, values: &[String]) -> Result<(), StoreError>;

    /// Returns whether a document was removed.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<String, ObjectStorageError>;

    async fn delete(&self, url: &str) -> Result<(), ObjectStorageError>;
}

pub fn server_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn generate_id(collection: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);

    let mut hasher = Sha256::new();
    hasher.update(collection.as_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(seq.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());

    let mut id = hex::encode(hasher.finalize());
    id.truncate(ID_LEN);
    id
}

/// Field names end up inside JSON paths, so only plain identifiers pass.
pub fn validate_field(field: &str) -> Result<(), StoreError> {
    if !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::InvalidField {
            field: field.to_string(),
            reason: "is not a valid field name".to_string(),
        })
    }
}

/// Applies union-merge semantics to `fields[field]`. Returns whether the
/// document changed.
pub fn union_into(fields: &mut Fields, field: &str, values: &[String]) -> Result<bool, StoreError> {
    let slot = fields.entry(field.to_string()).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }

    let Value::Array(items) = slot else {
        return Err(StoreError::InvalidField {
            field: field.to_string(),
            reason: "does not hold an array".to_string(),
        });
    };

    let mut changed = false;
    for value in values {
        if !items.iter().any(|item| item.as_str() == Some(value.as_str())) {
            items.push(Value::String(value.clone()));
            changed = true;
        }
    }
    Ok(changed)
}

/// Total order over JSON scalars used when sorting documents in memory.
/// Mirrors SQLite: numbers before text, text compared bytewise.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) | Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Array(_) | Value::Object(_) => 3,
        }
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or_default(), y.as_f64().unwrap_or_default());
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.as_bytes().cmp(y.as_bytes()),
        _ => rank(a).cmp(&rank(b)).then_with(|| a.to_string().cmp(&b.to_string())),
    }
}
