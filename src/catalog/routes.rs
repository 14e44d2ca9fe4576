use axum::{
    Router,
    routing::{delete, get, post},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/books", get(handler::list_books))
        .route("/books", post(handler::add_book))
        .route("/books/:id", delete(handler::delete_book))
        .route("/events", get(handler::list_events))
        .route("/events", post(handler::add_event))
        .route("/events/:id", delete(handler::delete_event))
        .route("/reviews", get(handler::list_reviews))
        .route("/reviews/:id", delete(handler::delete_review))
}
