use serde::{Deserialize, Serialize};

pub const BOOKS: &str = "books";
pub const EVENTS: &str = "events";
pub const REVIEWS: &str = "reviews";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Book {
    /// Blob URLs owned by this book.
    pub fn blob_urls(&self) -> impl Iterator<Item = &str> {
        self.file_url
            .iter()
            .chain(self.image_url.iter())
            .map(String::as_str)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    #[default]
    Featured,
    Exclusive,
}

impl CollectionKind {
    /// Document store collection holding this kind.
    pub fn collection_name(&self) -> &'static str {
        match self {
            CollectionKind::Featured => "featuredCollections",
            CollectionKind::Exclusive => "exclusiveCollections",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Featured => "featured",
            CollectionKind::Exclusive => "exclusive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "featured" => Some(CollectionKind::Featured),
            "exclusive" => Some(CollectionKind::Exclusive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub books: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub event_time: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub book_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Review {
    pub fn display_author(&self) -> &str {
        match self.author.as_deref() {
            Some(author) if !author.trim().is_empty() => author,
            _ => "Anonymous",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_store_collections() {
        assert_eq!(CollectionKind::Featured.collection_name(), "featuredCollections");
        assert_eq!(CollectionKind::Exclusive.collection_name(), "exclusiveCollections");
        assert_eq!(CollectionKind::from_str("Exclusive"), Some(CollectionKind::Exclusive));
        assert_eq!(CollectionKind::from_str("popular"), None);
    }

    #[test]
    fn reviews_without_author_are_anonymous() {
        let review = Review {
            id: "r1".into(),
            author: Some("  ".into()),
            text: "lovely".into(),
            book_id: None,
            created_at: None,
        };
        assert_eq!(review.display_author(), "Anonymous");
    }

    #[test]
    fn reviews_without_text_still_decode() {
        let review: Review = serde_json::from_value(serde_json::json!({ "id": "r1", "bookId": "b1" })).unwrap();
        assert_eq!(review.text, "");
        assert_eq!(review.book_id.as_deref(), Some("b1"));
    }

    #[test]
    fn book_blob_urls_skip_missing_entries() {
        let book = Book {
            id: "b1".into(),
            title: "Dune".into(),
            description: String::new(),
            file_url: Some("https://x/books/a.pdf".into()),
            image_url: None,
            created_at: None,
        };
        assert_eq!(book.blob_urls().collect::<Vec<_>>(), vec!["https://x/books/a.pdf"]);
    }
}
