use crate::config::Config;
use crate::error::ObjectStorageError;
use crate::get_s3_url;
use crate::store::BlobStore;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;

pub struct ObjectStorage {
    pub client: Client,
    bucket: String,
    service: String,
}

impl ObjectStorage {
    pub async fn new(cfg: &Config) -> Result<Self, ObjectStorageError> {
        let region = cfg.storage.aws_region.clone();
        let endpoint_url = cfg.storage.aws_endpoint_url_s3.clone();
        let credentials = Credentials::new(
            &cfg.storage.aws_access_key_id,
            &cfg.storage.aws_secret_access_key,
            None,
            None,
            "config",
        );

        let config = aws_config::from_env()
            .region(aws_config::Region::new(region))
            .endpoint_url(endpoint_url)
            .credentials_provider(credentials)
            .load()
            .await;

        Ok(Self {
            client: Client::new(&config),
            bucket: cfg.app.get_bucket().to_string(),
            service: cfg.storage.service.to_string(),
        })
    }

    /// Public URL of `key`. Each path segment is percent-encoded.
    pub fn url_for(&self, key: &str) -> String {
        build_url(&self.service, &self.bucket, key)
    }

    /// Inverse of [`ObjectStorage::url_for`].
    pub fn key_for(&self, url: &str) -> Result<String, ObjectStorageError> {
        parse_key(&self.service, &self.bucket, url)
    }
}

fn build_url(service: &str, bucket: &str, key: &str) -> String {
    let encoded = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    get_s3_url(service, bucket, &encoded)
}

fn parse_key(service: &str, bucket: &str, url: &str) -> Result<String, ObjectStorageError> {
    let prefix = get_s3_url(service, bucket, "");
    let encoded = url
        .strip_prefix(&prefix)
        .ok_or_else(|| ObjectStorageError::ForeignUrl(url.to_string()))?;
    // download links may carry query parameters
    let encoded = encoded.split(['?', '#']).next().unwrap_or_default();

    let key = urlencoding::decode(encoded)
        .map_err(|e| ObjectStorageError::InvalidKey(format!("{}: {}", url, e)))?
        .into_owned();
    if key.is_empty() {
        return Err(ObjectStorageError::InvalidKey(url.to_string()));
    }
    Ok(key)
}

#[async_trait]
impl BlobStore for ObjectStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<String, ObjectStorageError> {
        if path.is_empty() {
            return Err(ObjectStorageError::InvalidKey(path.to_string()));
        }

        tracing::info!("uploading {} bytes to key: {}", bytes.len(), path);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .set_content_type(content_type.map(str::to_string))
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| ObjectStorageError::S3Error(Box::new(e)))?;

        Ok(self.url_for(path))
    }

    async fn delete(&self, url: &str) -> Result<(), ObjectStorageError> {
        let key = self.key_for(url)?;
        tracing::info!("deleting object with key: {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| ObjectStorageError::S3Error(Box::new(e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_round_trip_through_keys() {
        let url = build_url("t3", "spark-books", "books/1700000000000_My Book.pdf");
        assert_eq!(url, "https://spark-books.t3.storage.dev/books/1700000000000_My%20Book.pdf");
        assert_eq!(
            parse_key("t3", "spark-books", &url).unwrap(),
            "books/1700000000000_My Book.pdf"
        );
    }

    #[test]
    fn query_strings_are_ignored() {
        let key = parse_key("s3", "bucket", "https://bucket.s3.amazonaws.com/covers/a.png?x=1").unwrap();
        assert_eq!(key, "covers/a.png");
    }

    #[test]
    fn urls_from_other_buckets_are_rejected() {
        let err = parse_key("s3", "bucket", "https://other.s3.amazonaws.com/covers/a.png").unwrap_err();
        assert!(matches!(err, ObjectStorageError::ForeignUrl(_)));

        let err = parse_key("s3", "bucket", "https://bucket.s3.amazonaws.com/").unwrap_err();
        assert!(matches!(err, ObjectStorageError::InvalidKey(_)));
    }
}
