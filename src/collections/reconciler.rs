use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::model::{Collection, CollectionKind};
use crate::store::{DocumentStore, Fields, OrderBy};

pub const BOOKS_FIELD: &str = "books";

/// How an existing collection receives new members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// One union write per book id.
    #[default]
    Sequential,
    /// A single union write carrying every id.
    Batched,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionTarget {
    #[serde(default)]
    pub existing_id: Option<String>,
    #[serde(default)]
    pub new_name: Option<String>,
}

impl CollectionTarget {
    pub fn existing(id: impl Into<String>) -> Self {
        Self {
            existing_id: Some(id.into()),
            new_name: None,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            existing_id: None,
            new_name: Some(name.into()),
        }
    }

    fn destination(&self) -> Result<Destination<'_>, ReconcileError> {
        let existing = self.existing_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let name = self.new_name.as_deref().map(str::trim).filter(|s| !s.is_empty());

        match (existing, name) {
            (Some(_), Some(_)) => Err(ReconcileError::Validation("ambiguous destination collection".to_string())),
            (Some(id), None) => Ok(Destination::Existing(id)),
            (None, Some(name)) => Ok(Destination::New(name)),
            (None, None) => Err(ReconcileError::Validation("no destination collection".to_string())),
        }
    }
}

enum Destination<'a> {
    New(&'a str),
    Existing(&'a str),
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("failed to add books to collection")]
    Persistence(#[source] StoreError),

    #[error(
        "added {} of {} books before a write failed",
        .merged.len(),
        .merged.len() + .remaining.len()
    )]
    PartialMerge {
        merged: Vec<String>,
        remaining: Vec<String>,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionLists {
    pub featured: Vec<Collection>,
    pub exclusive: Vec<Collection>,
}

/// Drops duplicates, keeping the first occurrence of each id.
pub fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Featured and exclusive collection membership, on top of a document store.
pub struct Collections<'a> {
    store: &'a dyn DocumentStore,
    strategy: MergeStrategy,
}

impl<'a> Collections<'a> {
    pub fn new(store: &'a dyn DocumentStore, strategy: MergeStrategy) -> Self {
        Self { store, strategy }
    }

    /// Creates a collection seeded with `book_ids`, or merges them into an
    /// existing one. Returns the id of the collection written to.
    ///
    /// Input is validated before the store is touched. Writes that already
    /// succeeded are never rolled back: with [`MergeStrategy::Sequential`] a
    /// failure after the first write is reported as
    /// [`ReconcileError::PartialMerge`] naming the ids still to add.
    pub async fn add_books(
        &self,
        kind: CollectionKind,
        target: &CollectionTarget,
        book_ids: &[String],
    ) -> Result<String, ReconcileError> {
        if book_ids.is_empty() {
            return Err(ReconcileError::Validation("no books selected".to_string()));
        }
        if book_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ReconcileError::Validation("blank book id".to_string()));
        }
        let destination = target.destination()?;
        let book_ids = dedup_ids(book_ids);

        match destination {
            Destination::New(name) => self.create(kind, name, book_ids).await,
            Destination::Existing(id) => self.merge(kind, id, book_ids).await,
        }
    }

    async fn create(&self, kind: CollectionKind, name: &str, book_ids: Vec<String>) -> Result<String, ReconcileError> {
        let count = book_ids.len();
        let mut fields = Fields::new();
        fields.insert("name".to_string(), Value::String(name.to_string()));
        fields.insert(
            BOOKS_FIELD.to_string(),
            Value::Array(book_ids.into_iter().map(Value::String).collect()),
        );

        let id = self
            .store
            .create_document(kind.collection_name(), fields)
            .await
            .map_err(ReconcileError::Persistence)?;

        tracing::info!(kind = kind.as_str(), collection_id = %id, books = count, "created collection {}", name);
        Ok(id)
    }

    async fn merge(&self, kind: CollectionKind, id: &str, book_ids: Vec<String>) -> Result<String, ReconcileError> {
        let collection = kind.collection_name();

        match self.strategy {
            MergeStrategy::Batched => {
                self.store
                    .union_merge(collection, id, BOOKS_FIELD, &book_ids)
                    .await
                    .map_err(ReconcileError::Persistence)?;
            }
            MergeStrategy::Sequential => {
                for (done, book_id) in book_ids.iter().enumerate() {
                    let write = self
                        .store
                        .union_merge(collection, id, BOOKS_FIELD, std::slice::from_ref(book_id))
                        .await;

                    if let Err(source) = write {
                        if done == 0 {
                            return Err(ReconcileError::Persistence(source));
                        }
                        tracing::warn!(
                            kind = kind.as_str(),
                            collection_id = id,
                            merged = done,
                            remaining = book_ids.len() - done,
                            "union merge interrupted: {}",
                            crate::unpack_error(&source)
                        );
                        let (merged, remaining) = book_ids.split_at(done);
                        return Err(ReconcileError::PartialMerge {
                            merged: merged.to_vec(),
                            remaining: remaining.to_vec(),
                            source,
                        });
                    }
                }
            }
        }

        tracing::info!(kind = kind.as_str(), collection_id = id, books = book_ids.len(), "merged books into collection");
        Ok(id.to_string())
    }

    pub async fn list(&self, kind: CollectionKind) -> Result<Vec<Collection>, StoreError> {
        let collection = kind.collection_name();
        self.store
            .list_documents(collection, Some(&OrderBy::asc("name")))
            .await?
            .into_iter()
            .map(|doc| doc.decode(collection))
            .collect()
    }

    /// Both collection lists, each ordered by name.
    pub async fn list_all(&self) -> Result<CollectionLists, StoreError> {
        let (featured, exclusive) = futures_util::future::try_join(
            self.list(CollectionKind::Featured),
            self.list(CollectionKind::Exclusive),
        )
        .await?;
        Ok(CollectionLists { featured, exclusive })
    }

    pub async fn get(&self, kind: CollectionKind, id: &str) -> Result<Option<Collection>, StoreError> {
        let collection = kind.collection_name();
        match self.store.get_document(collection, id).await? {
            Some(doc) => Ok(Some(doc.decode(collection)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn as_set(list: &[String]) -> BTreeSet<String> {
        list.iter().cloned().collect()
    }

    async fn seed_f1(store: &MemoryStore) {
        let fields = json!({ "name": "F1", "books": ["b1", "b2"], "createdAt": "2024-01-01T00:00:00.000Z" });
        store
            .seed("featuredCollections", "F1", fields.as_object().cloned().unwrap())
            .await;
    }

    #[tokio::test]
    async fn new_collection_holds_exactly_the_selection() {
        let store = MemoryStore::new();
        let collections = Collections::new(&store, MergeStrategy::Sequential);

        let id = collections
            .add_books(CollectionKind::Featured, &CollectionTarget::named("  Winter Picks "), &ids(&["b4"]))
            .await
            .unwrap();

        let created = collections.get(CollectionKind::Featured, &id).await.unwrap().unwrap();
        assert_eq!(created.name, "Winter Picks");
        assert_eq!(created.books, ids(&["b4"]));
        assert!(created.created_at.is_some());
        assert!(collections.get(CollectionKind::Exclusive, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn new_collection_drops_duplicate_ids() {
        let store = MemoryStore::new();
        let collections = Collections::new(&store, MergeStrategy::Sequential);

        let id = collections
            .add_books(CollectionKind::Exclusive, &CollectionTarget::named("Staff"), &ids(&["b2", "b1", "b2"]))
            .await
            .unwrap();

        let created = collections.get(CollectionKind::Exclusive, &id).await.unwrap().unwrap();
        assert_eq!(created.books, ids(&["b2", "b1"]));
    }

    #[tokio::test]
    async fn merge_yields_union_with_existing_members() {
        for strategy in [MergeStrategy::Sequential, MergeStrategy::Batched] {
            let store = MemoryStore::new();
            seed_f1(&store).await;
            let collections = Collections::new(&store, strategy);

            let id = collections
                .add_books(CollectionKind::Featured, &CollectionTarget::existing("F1"), &ids(&["b2", "b3"]))
                .await
                .unwrap();
            assert_eq!(id, "F1");

            let merged = collections.get(CollectionKind::Featured, "F1").await.unwrap().unwrap();
            assert_eq!(as_set(&merged.books), as_set(&ids(&["b1", "b2", "b3"])));
            assert_eq!(merged.books.len(), 3);
        }
    }

    #[tokio::test]
    async fn merge_is_order_independent_and_idempotent() {
        let store = MemoryStore::new();
        seed_f1(&store).await;
        let collections = Collections::new(&store, MergeStrategy::Sequential);
        let target = CollectionTarget::existing("F1");

        collections
            .add_books(CollectionKind::Featured, &target, &ids(&["b5", "b4", "b1"]))
            .await
            .unwrap();
        let once = collections.get(CollectionKind::Featured, "F1").await.unwrap().unwrap();

        collections
            .add_books(CollectionKind::Featured, &target, &ids(&["b1", "b4", "b5"]))
            .await
            .unwrap();
        let twice = collections.get(CollectionKind::Featured, "F1").await.unwrap().unwrap();

        assert_eq!(once.books, twice.books);
        assert_eq!(as_set(&twice.books), as_set(&ids(&["b1", "b2", "b4", "b5"])));
    }

    #[tokio::test]
    async fn empty_selection_never_reaches_the_store() {
        let store = MemoryStore::new();
        let collections = Collections::new(&store, MergeStrategy::Sequential);

        let err = collections
            .add_books(CollectionKind::Featured, &CollectionTarget::named("Any"), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Validation(ref msg) if msg == "no books selected"));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn missing_destination_is_rejected() {
        let store = MemoryStore::new();
        let collections = Collections::new(&store, MergeStrategy::Sequential);

        for target in [
            CollectionTarget::default(),
            CollectionTarget {
                existing_id: Some(String::new()),
                new_name: Some("   ".to_string()),
            },
        ] {
            let err = collections
                .add_books(CollectionKind::Featured, &target, &ids(&["b1"]))
                .await
                .unwrap_err();
            assert!(matches!(err, ReconcileError::Validation(ref msg) if msg == "no destination collection"));
        }
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn both_destinations_are_rejected() {
        let store = MemoryStore::new();
        let collections = Collections::new(&store, MergeStrategy::Sequential);
        let target = CollectionTarget {
            existing_id: Some("F1".to_string()),
            new_name: Some("Winter Picks".to_string()),
        };

        let err = collections
            .add_books(CollectionKind::Featured, &target, &ids(&["b1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(_)));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn duplicate_names_create_distinct_collections() {
        let store = MemoryStore::new();
        let collections = Collections::new(&store, MergeStrategy::Sequential);
        let target = CollectionTarget::named("Winter Picks");

        let first = collections
            .add_books(CollectionKind::Featured, &target, &ids(&["b1"]))
            .await
            .unwrap();
        let second = collections
            .add_books(CollectionKind::Featured, &target, &ids(&["b2"]))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(collections.list(CollectionKind::Featured).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_collection_is_a_persistence_error() {
        let store = MemoryStore::new();
        let collections = Collections::new(&store, MergeStrategy::Sequential);

        let err = collections
            .add_books(CollectionKind::Exclusive, &CollectionTarget::existing("ghost"), &ids(&["b1", "b2"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Persistence(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn interrupted_sequence_reports_partial_merge() {
        let store = MemoryStore::new();
        seed_f1(&store).await;
        store.fail_writes_after(2);
        let collections = Collections::new(&store, MergeStrategy::Sequential);

        let err = collections
            .add_books(
                CollectionKind::Featured,
                &CollectionTarget::existing("F1"),
                &ids(&["b3", "b4", "b5", "b6"]),
            )
            .await
            .unwrap_err();

        match err {
            ReconcileError::PartialMerge { merged, remaining, .. } => {
                assert_eq!(merged, ids(&["b3", "b4"]));
                assert_eq!(remaining, ids(&["b5", "b6"]));
            }
            other => panic!("expected partial merge, got {other:?}"),
        }

        // completed writes stay in place
        let current = collections.get(CollectionKind::Featured, "F1").await.unwrap().unwrap();
        assert_eq!(current.books, ids(&["b1", "b2", "b3", "b4"]));
    }

    #[tokio::test]
    async fn batched_failure_is_all_or_nothing() {
        let store = MemoryStore::new();
        seed_f1(&store).await;
        store.fail_writes_after(0);
        let collections = Collections::new(&store, MergeStrategy::Batched);

        let err = collections
            .add_books(CollectionKind::Featured, &CollectionTarget::existing("F1"), &ids(&["b3", "b4"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Persistence(_)));

        let current = collections.get(CollectionKind::Featured, "F1").await.unwrap().unwrap();
        assert_eq!(current.books, ids(&["b1", "b2"]));
    }

    #[tokio::test]
    async fn list_all_orders_each_kind_by_name() {
        let store = MemoryStore::new();
        let collections = Collections::new(&store, MergeStrategy::Sequential);
        for (kind, name) in [
            (CollectionKind::Featured, "Zeta"),
            (CollectionKind::Featured, "Alpha"),
            (CollectionKind::Exclusive, "Members"),
        ] {
            collections
                .add_books(kind, &CollectionTarget::named(name), &ids(&["b1"]))
                .await
                .unwrap();
        }

        let lists = collections.list_all().await.unwrap();
        let featured: Vec<_> = lists.featured.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(featured, vec!["Alpha", "Zeta"]);
        assert_eq!(lists.exclusive.len(), 1);
    }
}
