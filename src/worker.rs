//! Worker loop: receive, process, acknowledge.
//!
//! Per-message contract: decode the notification (direct or SNS-wrapped),
//! fetch each referenced object, parse it, upsert every row, and only then
//! delete the message. Failure classes:
//!
//! - non-retriable (missing object, unparseable file): delete and report,
//!   since redelivery would fail the same way
//! - retriable (transient table or transport failure): leave the message;
//!   the visibility timeout triggers redelivery on another consumer
//! - partial (malformed row): skip, count, continue
//!
//! Multiple worker loops run concurrently with no coordination beyond the
//! queue's single-consumer visibility window. A loop never terminates on a
//! single-message failure.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::notification::{self, NotificationError};
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::parse::{self, ParseError};
use crate::queue::{QueueMessage, WorkQueue};
use crate::table::{RowStore, TableError};

/// Delay before polling again after a receive error.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Classified processing failure.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Redelivery cannot succeed; the message is acknowledged anyway.
    #[error("Non-retriable: {0}")]
    NonRetriable(String),

    /// Redelivery may succeed; the message is left for the visibility
    /// timeout to make visible again.
    #[error("Retriable: {0}")]
    Retriable(String),
}

impl From<NotificationError> for ProcessError {
    fn from(e: NotificationError) -> Self {
        // The same bytes will decode the same way on every delivery.
        ProcessError::NonRetriable(e.to_string())
    }
}

impl From<ParseError> for ProcessError {
    fn from(e: ParseError) -> Self {
        ProcessError::NonRetriable(e.to_string())
    }
}

impl From<ObjectStoreError> for ProcessError {
    fn from(e: ObjectStoreError) -> Self {
        match e {
            ObjectStoreError::NotFound { .. } | ObjectStoreError::AccessDenied { .. } => {
                ProcessError::NonRetriable(e.to_string())
            }
            ObjectStoreError::Fetch(_) => ProcessError::Retriable(e.to_string()),
        }
    }
}

impl From<TableError> for ProcessError {
    fn from(e: TableError) -> Self {
        if e.is_transient() {
            ProcessError::Retriable(e.to_string())
        } else {
            ProcessError::NonRetriable(e.to_string())
        }
    }
}

/// Counters for one processed message.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MessageOutcome {
    /// Objects fetched and fully ingested.
    pub objects: usize,
    /// Rows written to the table.
    pub upserts: usize,
    /// Malformed rows skipped.
    pub skipped: usize,
}

/// Worker tuning, distilled from `Config`.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// CSV column holding the row identifier.
    pub id_field: String,
    /// Receive batch size.
    pub max_messages: i32,
    /// Long-polling wait in seconds.
    pub wait_time_secs: i32,
}

/// One consumer over the queue, object store, and row table.
pub struct Worker {
    queue: Arc<dyn WorkQueue>,
    objects: Arc<dyn ObjectStore>,
    table: Arc<dyn RowStore>,
    options: WorkerOptions,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        objects: Arc<dyn ObjectStore>,
        table: Arc<dyn RowStore>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            queue,
            objects,
            table,
            options,
        }
    }

    /// Process one message end to end. Does not touch the queue.
    pub async fn process_message(
        &self,
        message: &QueueMessage,
    ) -> std::result::Result<MessageOutcome, ProcessError> {
        let refs = notification::decode_notification(&message.body)?;

        let mut outcome = MessageOutcome::default();
        for object_ref in &refs {
            let content = self.objects.fetch(&object_ref.bucket, &object_ref.key).await?;
            let source = format!("{}/{}", object_ref.bucket, object_ref.key);
            let parsed = parse::parse_rows(&content, &self.options.id_field, &source)?;

            for row in &parsed.rows {
                self.table.upsert(row).await?;
            }

            outcome.objects += 1;
            outcome.upserts += parsed.rows.len();
            outcome.skipped += parsed.skipped;
        }
        Ok(outcome)
    }

    /// Process a message and acknowledge according to the failure class.
    pub async fn handle_message(&self, message: &QueueMessage) {
        match self.process_message(message).await {
            Ok(outcome) => {
                info!(
                    objects = outcome.objects,
                    upserts = outcome.upserts,
                    skipped = outcome.skipped,
                    receive_count = message.receive_count,
                    "Processed message"
                );
                self.acknowledge(message).await;
            }
            Err(ProcessError::NonRetriable(reason)) => {
                error!(
                    reason = %reason,
                    receive_count = message.receive_count,
                    "Dropping message: reprocessing cannot succeed"
                );
                self.acknowledge(message).await;
            }
            Err(ProcessError::Retriable(reason)) => {
                warn!(
                    reason = %reason,
                    receive_count = message.receive_count,
                    "Leaving message for redelivery after visibility timeout"
                );
            }
        }
    }

    async fn acknowledge(&self, message: &QueueMessage) {
        if let Err(e) = self.queue.delete(&message.receipt_handle).await {
            // Redelivery after a failed delete is safe: upserts overwrite.
            warn!(error = %e, "Failed to delete message");
        }
    }

    /// Receive-process-acknowledge loop until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                r = self
                    .queue
                    .receive(self.options.max_messages, self.options.wait_time_secs) => r,
                changed = shutdown.changed() => {
                    match changed {
                        Ok(()) if !*shutdown.borrow() => continue,
                        _ => break,
                    }
                }
            };

            match received {
                Ok(messages) => {
                    for message in &messages {
                        self.handle_message(message).await;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to receive messages");
                    tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                }
            }
        }
        info!("Worker loop stopped");
    }
}

/// Spawn `concurrency` independent worker loops sharing the same
/// collaborators, and wait for all of them to stop.
pub async fn run_pool(worker: Arc<Worker>, concurrency: usize, shutdown: watch::Receiver<bool>) {
    let handles: Vec<_> = (0..concurrency.max(1))
        .map(|index| {
            let worker = Arc::clone(&worker);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                info!(worker = index, "Worker started");
                worker.run(shutdown).await;
            })
        })
        .collect();

    join_all(handles).await;
}
