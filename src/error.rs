use std::{error::Error, fmt};

#[derive(Debug)]
pub enum ObjectStorageError {
    S3Error(Box<dyn Error + Send + Sync + 'static>),
    ForeignUrl(String),
    InvalidKey(String),
    NotFound(String),
}

impl std::error::Error for ObjectStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use ObjectStorageError::*;
        match self {
            S3Error(e) => Some(e.as_ref() as &dyn Error),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectStorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ObjectStorageError::*;
        match self {
            S3Error(e) => write!(f, "S3Error: {}", e),
            ForeignUrl(s) => write!(f, "ForeignUrl: {}", s),
            InvalidKey(s) => write!(f, "InvalidKey: {}", s),
            NotFound(s) => write!(f, "NotFound: {}", s),
        }
    }
}

/// Failures raised by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("field `{field}` {reason}")]
    InvalidField { field: String, reason: String },

    #[error("malformed document {collection}/{id}: {reason}")]
    Malformed {
        collection: String,
        id: String,
        reason: String,
    },

    #[error("database error")]
    Database(#[from] libsql::Error),

    #[error("serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Failures raised by the catalog services (books, events, reviews).
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("failed to upload {path}")]
    Upload {
        path: String,
        #[source]
        source: ObjectStorageError,
    },

    #[error("persistence failed")]
    Persistence(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_storage_errors_name_their_variant() {
        let err = ObjectStorageError::ForeignUrl("https://elsewhere/x".into());
        assert_eq!(err.to_string(), "ForeignUrl: https://elsewhere/x");
        assert!(err.source().is_none());

        let err = ObjectStorageError::S3Error("timeout".into());
        assert_eq!(err.to_string(), "S3Error: timeout");
        assert!(err.source().is_some());
    }
}
