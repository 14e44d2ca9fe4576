use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    response::IntoResponse,
    routing::get,
};
use tracing::info;

use crate::collections::{self, MergeStrategy};
use crate::store::{BlobStore, DocumentStore};
use crate::{api::ApiResponse, catalog};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub merge_strategy: MergeStrategy,
}

pub async fn healthcheck() -> impl IntoResponse {
    info!("got healthcheck request");
    Json(ApiResponse { data: "ok" })
}

/// Every console route, without outer layers (CORS, state).
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(healthcheck))
        .merge(catalog::routes())
        .nest("/collections", collections::routes())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
