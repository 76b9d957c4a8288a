//! Amazon S3 object store.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use tracing::debug;

use super::{ObjectStore, ObjectStoreError, Result};

/// S3-backed object store.
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Create an object store over an existing S3 client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                if err_str.contains("NoSuchKey") || err_str.contains("404") {
                    ObjectStoreError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else if err_str.contains("AccessDenied") || err_str.contains("403") {
                    ObjectStoreError::AccessDenied {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    ObjectStoreError::Fetch(format!("S3 download failed: {}", e))
                }
            })?;

        let content = response
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::Fetch(format!("S3 body read failed: {}", e)))?
            .into_bytes()
            .to_vec();

        debug!(
            bucket = %bucket,
            key = %key,
            size = content.len(),
            "Fetched object from S3"
        );
        Ok(content)
    }
}
