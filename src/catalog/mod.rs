//! Catalog Module
//!
//! Single-record administration for the catalog: books (with their file and
//! cover uploads), upcoming events, and moderation of user reviews.
//!
//! Deleting a book also tries to remove its uploads from the blob store.
//! That cleanup is best effort: the book record is deleted even when a blob
//! cannot be, and the outcome lists what happened to each URL.

mod handler;
mod lib;
mod routes;

pub use lib::*;
pub use routes::routes;
