//! Work queue abstraction.
//!
//! One message per uploaded object, at-least-once delivery. The queue's
//! visibility timeout is the only retry and mutual-exclusion mechanism:
//! a received message stays hidden from other consumers until it is either
//! deleted or the timeout expires and it becomes visible again.

pub mod mock;
pub mod sqs;

pub use mock::MockWorkQueue;
pub use sqs::SqsWorkQueue;

use async_trait::async_trait;

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors that can occur during queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Delete failed: {0}")]
    Delete(String),
}

/// One received unit of work.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Raw notification body.
    pub body: String,
    /// Handle used to acknowledge (delete) this delivery.
    pub receipt_handle: String,
    /// Approximate number of times this message has been delivered.
    pub receive_count: u32,
}

/// Interface to the work queue.
///
/// Implementations:
/// - `SqsWorkQueue`: AWS SQS
/// - `MockWorkQueue`: in-memory queue for testing
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Receive up to `max_messages`, long-polling up to `wait_time_secs`.
    ///
    /// An empty result is normal when the queue is idle.
    async fn receive(&self, max_messages: i32, wait_time_secs: i32) -> Result<Vec<QueueMessage>>;

    /// Acknowledge a delivery. The message will not be redelivered.
    async fn delete(&self, receipt_handle: &str) -> Result<()>;
}
