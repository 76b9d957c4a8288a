//! In-memory row store for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Result, RowRecord, RowStore, TableError};

/// Mock row store for testing.
#[derive(Default)]
pub struct MockRowStore {
    rows: RwLock<HashMap<String, RowRecord>>,
    succeed_before_failing: RwLock<usize>,
    fail_transient: RwLock<usize>,
    upserts: RwLock<usize>,
}

impl MockRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` upserts fail transiently.
    pub async fn fail_transient_next(&self, n: usize) {
        self.fail_transient_after(0, n).await;
    }

    /// Let `successes` upserts through, then fail the next `n` transiently.
    /// Leaves the store mid-write, the state a crash between rows produces.
    pub async fn fail_transient_after(&self, successes: usize, n: usize) {
        *self.succeed_before_failing.write().await = successes;
        *self.fail_transient.write().await = n;
    }

    /// Snapshot of the table contents.
    pub async fn rows(&self) -> HashMap<String, RowRecord> {
        self.rows.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Total successful upsert calls, counting overwrites.
    pub async fn upsert_count(&self) -> usize {
        *self.upserts.read().await
    }
}

#[async_trait]
impl RowStore for MockRowStore {
    async fn upsert(&self, record: &RowRecord) -> Result<()> {
        {
            let mut ok_left = self.succeed_before_failing.write().await;
            if *ok_left > 0 {
                *ok_left -= 1;
            } else {
                let mut fail = self.fail_transient.write().await;
                if *fail > 0 {
                    *fail -= 1;
                    return Err(TableError::Unavailable(
                        "Mock transient write failure".to_string(),
                    ));
                }
            }
        }

        self.rows
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        *self.upserts.write().await += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(id: &str, name: &str) -> RowRecord {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), id.to_string());
        fields.insert("name".to_string(), name.to_string());
        RowRecord {
            id: id.to_string(),
            fields,
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let store = MockRowStore::new();
        store.upsert(&record("1", "Alice")).await.unwrap();
        store.upsert(&record("1", "Alicia")).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.upsert_count().await, 2);
        let rows = store.rows().await;
        assert_eq!(rows["1"].fields["name"], "Alicia");
    }

    #[tokio::test]
    async fn test_transient_failure_injection() {
        let store = MockRowStore::new();
        store.fail_transient_next(1).await;

        let err = store.upsert(&record("1", "Alice")).await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.is_empty().await);

        store.upsert(&record("1", "Alice")).await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_failure_after_some_successes() {
        let store = MockRowStore::new();
        store.fail_transient_after(1, 1).await;

        store.upsert(&record("1", "Alice")).await.unwrap();
        let err = store.upsert(&record("2", "Bob")).await.unwrap_err();
        assert!(err.is_transient());

        // Partial state: only the first row landed.
        assert_eq!(store.len().await, 1);
        store.upsert(&record("2", "Bob")).await.unwrap();
        assert_eq!(store.len().await, 2);
    }
}
