//! AWS SQS work queue.

use async_trait::async_trait;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client;
use tracing::{debug, info};

use super::{QueueError, QueueMessage, Result, WorkQueue};

/// SQS-backed work queue.
pub struct SqsWorkQueue {
    client: Client,
    queue_url: String,
}

impl SqsWorkQueue {
    /// Create a work queue over an existing SQS client.
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        let queue_url = queue_url.into();
        info!(queue_url = %queue_url, "Using SQS work queue");
        Self { client, queue_url }
    }

    /// Resolve a queue URL by name.
    pub async fn resolve_queue_url(client: &Client, queue_name: &str) -> Result<String> {
        let result = client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|e| QueueError::Receive(format!("Failed to resolve queue URL: {}", e)))?;

        result
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| QueueError::Receive("GetQueueUrl returned no URL".to_string()))
    }

    /// The resolved queue URL.
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl WorkQueue for SqsWorkQueue {
    async fn receive(&self, max_messages: i32, wait_time_secs: i32) -> Result<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_time_secs)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| QueueError::Receive(format!("Failed to receive from SQS: {}", e)))?;

        let mut messages = Vec::new();
        for message in output.messages() {
            let body = match message.body() {
                Some(b) => b,
                None => continue,
            };
            let receipt_handle = match message.receipt_handle() {
                Some(r) => r,
                None => continue,
            };
            let receive_count = message
                .attributes()
                .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);

            messages.push(QueueMessage {
                body: body.to_string(),
                receipt_handle: receipt_handle.to_string(),
                receive_count,
            });
        }

        if !messages.is_empty() {
            debug!(count = messages.len(), "Received messages from SQS");
        }
        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete(format!("Failed to delete from SQS: {}", e)))?;

        debug!("Deleted message from SQS");
        Ok(())
    }
}
