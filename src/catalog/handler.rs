//! HTTP Handlers for books, events and reviews

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    response::Response,
};
use serde::Serialize;

use super::{BookOrder, Catalog, NewBook, NewEvent, Upload};
use crate::api::{ListParams, bad_request, created, internal_error, no_content, not_found, success};
use crate::error::CatalogError;
use crate::handler::AppState;
use crate::model::Review;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub display_author: String,
}

impl From<Review> for ReviewView {
    fn from(review: Review) -> Self {
        let display_author = review.display_author().to_string();
        Self { review, display_author }
    }
}

fn catalog_error(action: &str, err: CatalogError) -> Response {
    match err {
        CatalogError::Validation(msg) => bad_request(&msg),
        CatalogError::NotFound { entity, .. } => not_found(&format!("{} not found", entity)),
        other => {
            tracing::error!("Failed to {}: {}", action, crate::unpack_error(&other));
            internal_error(&format!("Failed to {}", action))
        }
    }
}

// ============================================================================
// Book Handlers
// ============================================================================

pub async fn list_books(State(state): State<AppState>, Query(params): Query<ListParams>) -> Response {
    let order = match params.order.as_deref() {
        None => BookOrder::default(),
        Some(s) => match BookOrder::from_str(s) {
            Some(order) => order,
            None => return bad_request("order must be one of: recent, title"),
        },
    };
    let lib = Catalog::new(state.store.as_ref(), state.blobs.as_ref());

    match lib.list_books(order).await {
        Ok(books) => success(books),
        Err(e) => catalog_error("list books", e),
    }
}

pub async fn add_book(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut input = NewBook::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read multipart field: {}", e);
                return bad_request("Malformed multipart body");
            }
        };
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "title" | "description" => {
                let text = match field.text().await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Failed to read field {}: {}", name, e);
                        return bad_request("Malformed multipart body");
                    }
                };
                if name == "title" {
                    input.title = text;
                } else {
                    input.description = text;
                }
            }
            "file" | "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = match field.bytes().await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!("Failed to read field bytes: {}", e);
                        return bad_request("Malformed multipart body");
                    }
                };
                // browsers send an empty part for an untouched file input
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }

                tracing::info!("Processing file: {} ({} bytes)", file_name, bytes.len());
                let upload = Upload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                };
                if name == "file" {
                    input.file = Some(upload);
                } else {
                    input.image = Some(upload);
                }
            }
            other => tracing::debug!("ignoring multipart field {}", other),
        }
    }

    let lib = Catalog::new(state.store.as_ref(), state.blobs.as_ref());
    match lib.add_book(input).await {
        Ok(book) => created(book),
        Err(e) => catalog_error("add book", e),
    }
}

pub async fn delete_book(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let lib = Catalog::new(state.store.as_ref(), state.blobs.as_ref());

    match lib.delete_book(&id).await {
        Ok(outcome) => success(outcome),
        Err(e) => catalog_error("delete book", e),
    }
}

// ============================================================================
// Event Handlers
// ============================================================================

pub async fn list_events(State(state): State<AppState>) -> Response {
    let lib = Catalog::new(state.store.as_ref(), state.blobs.as_ref());

    match lib.list_events().await {
        Ok(events) => success(events),
        Err(e) => catalog_error("list events", e),
    }
}

pub async fn add_event(State(state): State<AppState>, Json(payload): Json<NewEvent>) -> Response {
    let lib = Catalog::new(state.store.as_ref(), state.blobs.as_ref());

    match lib.add_event(payload).await {
        Ok(event) => created(event),
        Err(e) => catalog_error("create event", e),
    }
}

pub async fn delete_event(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let lib = Catalog::new(state.store.as_ref(), state.blobs.as_ref());

    match lib.delete_event(&id).await {
        Ok(()) => no_content(),
        Err(e) => catalog_error("delete event", e),
    }
}

// ============================================================================
// Review Handlers
// ============================================================================

pub async fn list_reviews(State(state): State<AppState>) -> Response {
    let lib = Catalog::new(state.store.as_ref(), state.blobs.as_ref());

    match lib.list_reviews().await {
        Ok(reviews) => success(reviews.into_iter().map(ReviewView::from).collect::<Vec<_>>()),
        Err(e) => catalog_error("list reviews", e),
    }
}

pub async fn delete_review(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let lib = Catalog::new(state.store.as_ref(), state.blobs.as_ref());

    match lib.delete_review(&id).await {
        Ok(()) => no_content(),
        Err(e) => catalog_error("delete review", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::MergeStrategy;
    use crate::handler::router;
    use crate::store::memory::{MemoryBlobStore, MemoryStore};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(store: Arc<MemoryStore>, blobs: Arc<MemoryBlobStore>) -> axum::Router {
        router(1024 * 1024).with_state(AppState {
            store,
            blobs,
            merge_strategy: MergeStrategy::Sequential,
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn multipart_body(boundary: &str) -> String {
        [
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nDune\r\n"),
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\nSpice\r\n"),
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"dune.pdf\"\r\nContent-Type: application/pdf\r\n\r\n%PDF\r\n"
            ),
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"\"\r\n\r\n\r\n"),
            format!("--{boundary}--\r\n"),
        ]
        .concat()
    }

    #[tokio::test]
    async fn multipart_upload_creates_book() {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let boundary = "sparkbooksboundary";

        let response = app(store, blobs.clone())
            .oneshot(
                Request::post("/books")
                    .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                    .body(Body::from(multipart_body(boundary)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["data"]["title"], "Dune");
        assert!(body["data"]["imageUrl"].is_null());
        let url = body["data"]["fileUrl"].as_str().unwrap();
        assert!(blobs.contains(url).await);
    }

    #[tokio::test]
    async fn invalid_event_is_a_bad_request() {
        let response = app(Arc::new(MemoryStore::new()), Arc::new(MemoryBlobStore::new()))
            .oneshot(
                Request::post("/events")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "title": "Talk" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "title and event time are required");
    }

    #[tokio::test]
    async fn reviews_carry_display_author() {
        let store = Arc::new(MemoryStore::new());
        let fields = json!({ "text": "meh", "createdAt": "2024-01-01T00:00:00.000Z" });
        store
            .seed("reviews", "r1", fields.as_object().cloned().unwrap())
            .await;

        let response = app(store, Arc::new(MemoryBlobStore::new()))
            .oneshot(Request::get("/reviews").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"][0]["id"], "r1");
        assert_eq!(body["data"][0]["displayAuthor"], "Anonymous");
    }

    #[tokio::test]
    async fn deleting_missing_records_is_not_found() {
        let app = app(Arc::new(MemoryStore::new()), Arc::new(MemoryBlobStore::new()));

        for uri in ["/books/nope", "/events/nope", "/reviews/nope"] {
            let response = app
                .clone()
                .oneshot(Request::delete(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn unknown_book_order_is_rejected() {
        let response = app(Arc::new(MemoryStore::new()), Arc::new(MemoryBlobStore::new()))
            .oneshot(Request::get("/books?order=rating").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
