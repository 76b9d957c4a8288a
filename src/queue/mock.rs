//! In-memory work queue for testing.
//!
//! Models SQS visibility: received messages are hidden (in flight) until
//! deleted or released back by `release_inflight`, which stands in for
//! visibility-timeout expiry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{QueueError, QueueMessage, Result, WorkQueue};

#[derive(Default)]
struct State {
    visible: Vec<QueueMessage>,
    inflight: HashMap<String, QueueMessage>,
    deleted: usize,
}

/// Mock work queue for testing.
#[derive(Default)]
pub struct MockWorkQueue {
    state: RwLock<State>,
    receipt_counter: AtomicU64,
    fail_on_delete: RwLock<bool>,
}

impl MockWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message body.
    pub async fn push(&self, body: impl Into<String>) {
        let mut state = self.state.write().await;
        state.visible.push(QueueMessage {
            body: body.into(),
            receipt_handle: String::new(),
            receive_count: 0,
        });
    }

    /// Make all in-flight messages visible again, as if their visibility
    /// timeout expired.
    pub async fn release_inflight(&self) {
        let mut state = self.state.write().await;
        let released: Vec<QueueMessage> = state.inflight.drain().map(|(_, m)| m).collect();
        state.visible.extend(released);
    }

    pub async fn set_fail_on_delete(&self, fail: bool) {
        *self.fail_on_delete.write().await = fail;
    }

    pub async fn visible_len(&self) -> usize {
        self.state.read().await.visible.len()
    }

    pub async fn inflight_len(&self) -> usize {
        self.state.read().await.inflight.len()
    }

    pub async fn deleted_count(&self) -> usize {
        self.state.read().await.deleted
    }
}

#[async_trait]
impl WorkQueue for MockWorkQueue {
    async fn receive(&self, max_messages: i32, _wait_time_secs: i32) -> Result<Vec<QueueMessage>> {
        let mut state = self.state.write().await;
        let take = (max_messages.max(1) as usize).min(state.visible.len());

        let mut received = Vec::with_capacity(take);
        for mut message in state.visible.drain(..take).collect::<Vec<_>>() {
            let receipt = format!("receipt-{}", self.receipt_counter.fetch_add(1, Ordering::SeqCst));
            message.receipt_handle = receipt.clone();
            message.receive_count += 1;
            state.inflight.insert(receipt, message.clone());
            received.push(message);
        }
        drop(state);

        if received.is_empty() {
            // Stand-in for long polling so callers don't spin.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(received)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        if *self.fail_on_delete.read().await {
            return Err(QueueError::Delete("Mock delete failure".to_string()));
        }
        let mut state = self.state.write().await;
        if state.inflight.remove(receipt_handle).is_some() {
            state.deleted += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_receive_hides_message() {
        let queue = MockWorkQueue::new();
        queue.push("body").await;

        let received = queue.receive(10, 0).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].receive_count, 1);
        assert_eq!(queue.visible_len().await, 0);
        assert_eq!(queue.inflight_len().await, 1);

        // Hidden while in flight.
        let again = queue.receive(10, 0).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_delete_acknowledges() {
        let queue = MockWorkQueue::new();
        queue.push("body").await;

        let received = queue.receive(10, 0).await.unwrap();
        queue.delete(&received[0].receipt_handle).await.unwrap();

        assert_eq!(queue.deleted_count().await, 1);
        assert_eq!(queue.inflight_len().await, 0);

        queue.release_inflight().await;
        assert_eq!(queue.visible_len().await, 0);
    }

    #[tokio::test]
    async fn test_release_redelivers_with_bumped_count() {
        let queue = MockWorkQueue::new();
        queue.push("body").await;

        let first = queue.receive(10, 0).await.unwrap();
        assert_eq!(first[0].receive_count, 1);

        queue.release_inflight().await;
        let second = queue.receive(10, 0).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].receive_count, 2);
        assert_eq!(second[0].body, "body");
    }

    #[tokio::test]
    async fn test_receive_respects_batch_size() {
        let queue = MockWorkQueue::new();
        for i in 0..5 {
            queue.push(format!("body-{}", i)).await;
        }

        let received = queue.receive(2, 0).await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(queue.visible_len().await, 3);
    }
}
