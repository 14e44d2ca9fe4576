//! Collections Module
//!
//! Curated groups of books, in two kinds: featured and exclusive. Each kind
//! lives in its own document store collection as `{name, books, createdAt}`,
//! where `books` is an array of book ids with set semantics.
//!
//! # Adding books
//!
//! [`Collections::add_books`] either creates a new collection seeded with the
//! selection, or union-merges the selection into an existing one. Merges are
//! idempotent and commutative, so concurrent submissions from different
//! consoles converge on the same membership without locking.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sparkbooks_admin::collections::{Collections, CollectionTarget, MergeStrategy};
//!
//! let lib = Collections::new(store.as_ref(), MergeStrategy::Sequential);
//! let id = lib
//!     .add_books(CollectionKind::Featured, &CollectionTarget::existing("F1"), &ids)
//!     .await?;
//! let lists = lib.list_all().await?;
//! ```

mod form;
mod handler;
mod reconciler;
mod routes;

pub use form::{AddBooksRequest, CollectionForm, FormAction};
pub use reconciler::*;
pub use routes::routes;
