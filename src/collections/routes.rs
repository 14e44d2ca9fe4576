use axum::{
    Router,
    routing::{get, post},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list_collections))
        .route("/", post(handler::submit_form))
        .route("/:kind/:id", get(handler::get_collection))
}
