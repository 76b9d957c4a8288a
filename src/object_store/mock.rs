//! In-memory object store for testing.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ObjectStore, ObjectStoreError, Result};

/// Mock object store for testing.
///
/// Unknown keys behave as `NotFound`; keys registered via `deny_access`
/// behave as `AccessDenied`; `fail_next_fetch` injects a transient failure.
#[derive(Default)]
pub struct MockObjectStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
    denied: RwLock<HashSet<(String, String)>>,
    fail_next: RwLock<usize>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object.
    pub async fn put(&self, bucket: &str, key: &str, content: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()), content.into());
    }

    /// Make fetches of this object fail with `AccessDenied`.
    pub async fn deny_access(&self, bucket: &str, key: &str) {
        self.denied
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()));
    }

    /// Make the next `n` fetches fail transiently.
    pub async fn fail_next_fetch(&self, n: usize) {
        *self.fail_next.write().await = n;
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        {
            let mut fail_next = self.fail_next.write().await;
            if *fail_next > 0 {
                *fail_next -= 1;
                return Err(ObjectStoreError::Fetch(
                    "Mock transient fetch failure".to_string(),
                ));
            }
        }

        let lookup = (bucket.to_string(), key.to_string());
        if self.denied.read().await.contains(&lookup) {
            return Err(ObjectStoreError::AccessDenied {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        self.objects
            .read()
            .await
            .get(&lookup)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_fetch() {
        let store = MockObjectStore::new();
        store.put("uploads", "people.csv", b"id,name\n".to_vec()).await;

        let content = store.fetch("uploads", "people.csv").await.unwrap();
        assert_eq!(content, b"id,name\n");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let store = MockObjectStore::new();
        let result = store.fetch("uploads", "missing.csv").await;
        assert!(matches!(result, Err(ObjectStoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_denied_object() {
        let store = MockObjectStore::new();
        store.put("uploads", "secret.csv", b"x".to_vec()).await;
        store.deny_access("uploads", "secret.csv").await;

        let result = store.fetch("uploads", "secret.csv").await;
        assert!(matches!(result, Err(ObjectStoreError::AccessDenied { .. })));
    }

    #[tokio::test]
    async fn test_transient_failure_injection() {
        let store = MockObjectStore::new();
        store.put("uploads", "people.csv", b"x".to_vec()).await;
        store.fail_next_fetch(1).await;

        assert!(matches!(
            store.fetch("uploads", "people.csv").await,
            Err(ObjectStoreError::Fetch(_))
        ));
        assert!(store.fetch("uploads", "people.csv").await.is_ok());
    }
}
