use std::error::Error;

pub mod api;
pub mod catalog;
pub mod collections;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod model;
pub mod s3;
pub mod store;

pub fn unpack_error(err: &(dyn Error)) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}

pub fn get_s3_url(service: &str, bucket: &str, key: &str) -> String {
    match service {
        "t3" => format!("https://{}.t3.storage.dev/{}", bucket, key),
        "s3" => format!("https://{}.s3.amazonaws.com/{}", bucket, key),
        _ => format!("https://{}.storage.dev/{}", service, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn unpack_error_walks_the_source_chain() {
        let err = crate::collections::ReconcileError::Persistence(StoreError::NotFound {
            collection: "featuredCollections".to_string(),
            id: "F1".to_string(),
        });
        assert_eq!(
            unpack_error(&err),
            "failed to add books to collection: document featuredCollections/F1 not found"
        );
    }
}
