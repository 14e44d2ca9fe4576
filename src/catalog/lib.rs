use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CatalogError;
use crate::model::{BOOKS, Book, EVENTS, Event, REVIEWS, Review};
use crate::store::{BlobStore, CREATED_AT, DocumentStore, Fields, OrderBy};

#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct NewBook {
    pub title: String,
    pub description: String,
    pub file: Option<Upload>,
    pub image: Option<Upload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub event_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookOrder {
    /// Newest first, as the management view lists them.
    #[default]
    Recent,
    /// Alphabetical, as the collection picker lists them.
    Title,
}

impl BookOrder {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "recent" => Some(BookOrder::Recent),
            "title" => Some(BookOrder::Title),
            _ => None,
        }
    }

    fn order_by(&self) -> OrderBy {
        match self {
            BookOrder::Recent => OrderBy::desc(CREATED_AT),
            BookOrder::Title => OrderBy::asc("title"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BlobCleanup {
    Removed,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobOutcome {
    pub url: String,
    #[serde(flatten)]
    pub cleanup: BlobCleanup,
}

/// Result of deleting a book. The document is always gone; blob cleanup is
/// best effort and reported per URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookDeletion {
    pub id: String,
    pub blobs: Vec<BlobOutcome>,
}

/// Book, event and review records.
pub struct Catalog<'a> {
    store: &'a dyn DocumentStore,
    blobs: &'a dyn BlobStore,
}

impl<'a> Catalog<'a> {
    pub fn new(store: &'a dyn DocumentStore, blobs: &'a dyn BlobStore) -> Self {
        Self { store, blobs }
    }

    // ------------------------------------------------------------------
    // Books
    // ------------------------------------------------------------------

    pub async fn add_book(&self, input: NewBook) -> Result<Book, CatalogError> {
        let title = input.title.trim();
        let description = input.description.trim();
        if title.is_empty() || description.is_empty() {
            return Err(CatalogError::Validation("title and description required".to_string()));
        }

        let mut uploaded = Vec::new();
        let result = self
            .add_book_internal(title, description, input.file, input.image, &mut uploaded)
            .await;

        if result.is_err() {
            for url in &uploaded {
                if let Err(e) = self.blobs.delete(url).await {
                    tracing::warn!("failed to remove orphaned upload {}: {}", url, e);
                }
            }
        }
        result
    }

    async fn add_book_internal(
        &self,
        title: &str,
        description: &str,
        file: Option<Upload>,
        image: Option<Upload>,
        uploaded: &mut Vec<String>,
    ) -> Result<Book, CatalogError> {
        let file_url = match file {
            Some(file) => Some(self.upload("books", file, uploaded).await?),
            None => None,
        };
        let image_url = match image {
            Some(image) => Some(self.upload("covers", image, uploaded).await?),
            None => None,
        };

        let mut fields = Fields::new();
        fields.insert("title".to_string(), title.into());
        fields.insert("description".to_string(), description.into());
        fields.insert("fileUrl".to_string(), file_url.clone().map_or(Value::Null, Value::String));
        if let Some(url) = &image_url {
            fields.insert("imageUrl".to_string(), url.as_str().into());
        }

        let id = self.store.create_document(BOOKS, fields).await?;
        tracing::info!(book_id = %id, "added book {}", title);

        self.store
            .get_document(BOOKS, &id)
            .await?
            .ok_or_else(|| CatalogError::NotFound { entity: "book", id })?
            .decode(BOOKS)
            .map_err(CatalogError::from)
    }

    async fn upload(&self, dir: &str, upload: Upload, uploaded: &mut Vec<String>) -> Result<String, CatalogError> {
        let path = upload_path(dir, &upload.file_name, Utc::now().timestamp_millis());
        let url = self
            .blobs
            .upload(&path, upload.bytes, upload.content_type.as_deref())
            .await
            .map_err(|source| CatalogError::Upload {
                path: path.clone(),
                source,
            })?;
        uploaded.push(url.clone());
        Ok(url)
    }

    pub async fn list_books(&self, order: BookOrder) -> Result<Vec<Book>, CatalogError> {
        let docs = self.store.list_documents(BOOKS, Some(&order.order_by())).await?;
        docs.into_iter()
            .map(|doc| doc.decode(BOOKS).map_err(CatalogError::from))
            .collect()
    }

    /// Deletes a book record. Blob cleanup failures are logged and reported
    /// but never stop the record from being deleted.
    pub async fn delete_book(&self, id: &str) -> Result<BookDeletion, CatalogError> {
        let book: Book = match self.store.get_document(BOOKS, id).await? {
            Some(doc) => doc.decode(BOOKS)?,
            None => {
                return Err(CatalogError::NotFound {
                    entity: "book",
                    id: id.to_string(),
                });
            }
        };

        let mut blobs = Vec::new();
        for url in book.blob_urls() {
            let cleanup = match self.blobs.delete(url).await {
                Ok(()) => BlobCleanup::Removed,
                Err(e) => {
                    tracing::warn!(book_id = id, "ignoring blob cleanup failure for {}: {}", url, e);
                    BlobCleanup::Failed { error: e.to_string() }
                }
            };
            blobs.push(BlobOutcome {
                url: url.to_string(),
                cleanup,
            });
        }

        self.store.delete_document(BOOKS, id).await?;
        tracing::info!(book_id = id, "deleted book {}", book.title);

        Ok(BookDeletion {
            id: id.to_string(),
            blobs,
        })
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub async fn add_event(&self, input: NewEvent) -> Result<Event, CatalogError> {
        let title = input.title.trim();
        if title.is_empty() || input.event_time.trim().is_empty() {
            return Err(CatalogError::Validation("title and event time are required".to_string()));
        }
        let event_time = parse_event_time(&input.event_time)
            .ok_or_else(|| CatalogError::Validation(format!("invalid event time: {}", input.event_time)))?;

        let mut fields = Fields::new();
        fields.insert("title".to_string(), title.into());
        fields.insert("description".to_string(), input.description.trim().into());
        fields.insert(
            "eventTime".to_string(),
            event_time.to_rfc3339_opts(SecondsFormat::Secs, true).into(),
        );

        let id = self.store.create_document(EVENTS, fields).await?;
        tracing::info!(event_id = %id, "created event {}", title);

        self.store
            .get_document(EVENTS, &id)
            .await?
            .ok_or_else(|| CatalogError::NotFound { entity: "event", id })?
            .decode(EVENTS)
            .map_err(CatalogError::from)
    }

    pub async fn list_events(&self) -> Result<Vec<Event>, CatalogError> {
        let docs = self
            .store
            .list_documents(EVENTS, Some(&OrderBy::asc("eventTime")))
            .await?;
        docs.into_iter()
            .map(|doc| doc.decode(EVENTS).map_err(CatalogError::from))
            .collect()
    }

    pub async fn delete_event(&self, id: &str) -> Result<(), CatalogError> {
        self.delete_plain(EVENTS, "event", id).await
    }

    // ------------------------------------------------------------------
    // Reviews
    // ------------------------------------------------------------------

    pub async fn list_reviews(&self) -> Result<Vec<Review>, CatalogError> {
        let docs = self
            .store
            .list_documents(REVIEWS, Some(&OrderBy::desc(CREATED_AT)))
            .await?;
        docs.into_iter()
            .map(|doc| doc.decode(REVIEWS).map_err(CatalogError::from))
            .collect()
    }

    pub async fn delete_review(&self, id: &str) -> Result<(), CatalogError> {
        self.delete_plain(REVIEWS, "review", id).await
    }

    async fn delete_plain(&self, collection: &str, entity: &'static str, id: &str) -> Result<(), CatalogError> {
        if !self.store.delete_document(collection, id).await? {
            return Err(CatalogError::NotFound {
                entity,
                id: id.to_string(),
            });
        }
        tracing::info!("deleted {} {}", entity, id);
        Ok(())
    }
}

/// `{dir}/{millis}_{name}`, keeping only the last component of the
/// client-supplied file name.
pub fn upload_path(dir: &str, file_name: &str, millis: i64) -> String {
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or("upload");
    format!("{}/{}_{}", dir, millis, name)
}

/// Accepts RFC 3339 or a `datetime-local` value, which is read as UTC.
pub fn parse_event_time(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .map(|naive| naive.and_utc())
}
