//! Object store abstraction.
//!
//! Uploaded CSV objects are read once by the worker and never mutated.
//! A missing or forbidden object cannot be fixed by retrying, so those
//! failures are distinguished from transport errors.

pub mod mock;
pub mod s3;

pub use mock::MockObjectStore;
pub use s3::S3ObjectStore;

use async_trait::async_trait;

/// Result type for object store operations.
pub type Result<T> = std::result::Result<T, ObjectStoreError>;

/// Errors that can occur fetching an object.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// The object does not exist. Retrying cannot succeed.
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Access was denied. Retrying cannot succeed.
    #[error("Access denied: s3://{bucket}/{key}")]
    AccessDenied { bucket: String, key: String },

    /// Transport or service failure. May succeed on retry.
    #[error("Failed to fetch object: {0}")]
    Fetch(String),
}

/// Read access to uploaded objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the full content of an object.
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}
