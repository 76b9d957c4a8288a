//! Row table abstraction.
//!
//! One record per parsed CSV row, keyed by the identifier field. Upserts
//! are pure overwrites by key, never accumulation, so re-processing the
//! same object converges to the same final state. Rows are independent;
//! no cross-row transactions exist.

pub mod dynamo;
pub mod mock;

pub use dynamo::DynamoRowStore;
pub use mock::MockRowStore;

use std::collections::BTreeMap;

use async_trait::async_trait;

/// Result type for table operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// Errors that can occur writing a row.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// Transient failure (throttled, unavailable). Safe to retry.
    #[error("Table unavailable: {0}")]
    Unavailable(String),

    /// The write was rejected and will not succeed on retry.
    #[error("Write rejected: {0}")]
    Rejected(String),
}

impl TableError {
    /// Whether leaving the message for redelivery can help.
    pub fn is_transient(&self) -> bool {
        matches!(self, TableError::Unavailable(_))
    }
}

/// One record, keyed by its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    /// Unique key. Either taken from the identifier column or generated.
    pub id: String,
    /// Remaining fields, named by the CSV header.
    pub fields: BTreeMap<String, String>,
}

/// Write access to the row table.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Insert-or-overwrite a record by its identifier.
    async fn upsert(&self, record: &RowRecord) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TableError::Unavailable("throttled".to_string()).is_transient());
        assert!(!TableError::Rejected("bad item".to_string()).is_transient());
    }
}
