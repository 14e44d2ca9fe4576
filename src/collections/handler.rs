//! HTTP Handlers for featured and exclusive collections

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use serde::Serialize;
use serde_json::json;

use super::{CollectionForm, CollectionLists, Collections, FormAction, ReconcileError};
use crate::api::{bad_request, conflict, error_with, internal_error, not_found, success};
use crate::error::StoreError;
use crate::handler::AppState;
use crate::model::CollectionKind;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBooksResponse {
    pub collection_id: String,
    /// The form after a successful submit, ready for the next one.
    pub form: CollectionForm,
    /// Fresh lists of both kinds; absent if the re-read failed.
    pub collections: Option<CollectionLists>,
}

pub async fn list_collections(State(state): State<AppState>) -> Response {
    let lib = Collections::new(state.store.as_ref(), state.merge_strategy);

    match lib.list_all().await {
        Ok(lists) => success(lists),
        Err(e) => {
            tracing::error!("Failed to load collections: {}", crate::unpack_error(&e));
            internal_error("Failed to load collections")
        }
    }
}

pub async fn get_collection(State(state): State<AppState>, Path((kind, id)): Path<(String, String)>) -> Response {
    let Some(kind) = CollectionKind::from_str(&kind) else {
        return bad_request("Unknown collection kind");
    };
    let lib = Collections::new(state.store.as_ref(), state.merge_strategy);

    match lib.get(kind, &id).await {
        Ok(Some(collection)) => success(collection),
        Ok(None) => not_found("Collection not found"),
        Err(e) => {
            tracing::error!("Failed to get collection: {}", crate::unpack_error(&e));
            internal_error("Failed to get collection")
        }
    }
}

pub async fn submit_form(State(state): State<AppState>, Json(form): Json<CollectionForm>) -> Response {
    let Some((submitting, request)) = form.begin_submit() else {
        return conflict("Submission already in progress");
    };
    let lib = Collections::new(state.store.as_ref(), state.merge_strategy);

    let collection_id = match lib.add_books(request.kind, &request.target, &request.book_ids).await {
        Ok(id) => id,
        Err(e) => return reconcile_error(e),
    };
    let form = submitting.apply(FormAction::SubmitSucceeded);

    let collections = match lib.list_all().await {
        Ok(lists) => Some(lists),
        Err(e) => {
            tracing::warn!("Failed to refresh collections after submit: {}", crate::unpack_error(&e));
            None
        }
    };

    success(AddBooksResponse {
        collection_id,
        form,
        collections,
    })
}

fn reconcile_error(err: ReconcileError) -> Response {
    match err {
        ReconcileError::Validation(msg) => bad_request(&msg),
        ReconcileError::Persistence(StoreError::NotFound { ref id, .. }) => {
            tracing::warn!(collection_id = %id, "Cannot add books to a missing collection");
            not_found("Collection not found")
        }
        ReconcileError::Persistence(ref source) => {
            tracing::error!("Failed to add books to collection: {}", crate::unpack_error(source));
            internal_error("Failed to add books to collection")
        }
        ReconcileError::PartialMerge {
            ref merged,
            ref remaining,
            ref source,
        } => {
            tracing::error!(
                merged = merged.len(),
                remaining = remaining.len(),
                "Failed to add all books to collection: {}",
                crate::unpack_error(source)
            );
            error_with(
                StatusCode::BAD_GATEWAY,
                "Failed to add all books to collection",
                Some(json!({ "merged": merged, "remaining": remaining })),
            )
        }
    }
}
