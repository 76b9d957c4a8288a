//! csv-processor: SQS-driven CSV ingestion worker
//!
//! Consumes upload notifications from the work queue, fetches the referenced
//! CSV objects from S3, and upserts their rows into the DynamoDB table.
//! Runs a pool of independent worker loops; the queue's visibility timeout
//! provides retries and mutual exclusion between them.
//!
//! ## Configuration
//! - QUEUE_URL: work queue URL (falls back to resolving `queue_name`)
//! - TABLE_NAME: DynamoDB table receiving rows
//! - AWS_REGION: target region
//! - CSV_PROCESSOR_LOG: log filter (default "info")

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use csv_processor::config::{Config, LOG_ENV_VAR};
use csv_processor::object_store::S3ObjectStore;
use csv_processor::queue::SqsWorkQueue;
use csv_processor::table::DynamoRowStore;
use csv_processor::worker::{run_pool, Worker, WorkerOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(None).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Starting csv-processor worker");

    let mut aws_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(ref region) = config.region {
        aws_loader = aws_loader.region(aws_config::Region::new(region.clone()));
    }
    if let Some(ref endpoint) = config.endpoint_url {
        aws_loader = aws_loader.endpoint_url(endpoint);
    }
    let aws_config = aws_loader.load().await;

    let sqs = aws_sdk_sqs::Client::new(&aws_config);
    let queue_url = match config.queue_url.clone() {
        Some(url) => url,
        None => SqsWorkQueue::resolve_queue_url(&sqs, &config.queue_name).await?,
    };
    info!(
        queue_url = %queue_url,
        table = %config.table_name,
        concurrency = config.worker_count(),
        "Pipeline endpoints resolved"
    );

    let queue: Arc<SqsWorkQueue> = Arc::new(SqsWorkQueue::new(sqs, queue_url));
    let objects = Arc::new(S3ObjectStore::new(aws_sdk_s3::Client::new(&aws_config)));
    let table = Arc::new(DynamoRowStore::new(
        aws_sdk_dynamodb::Client::new(&aws_config),
        config.table_name.clone(),
        config.id_field.clone(),
    ));

    let worker = Arc::new(Worker::new(
        queue,
        objects,
        table,
        WorkerOptions {
            id_field: config.id_field.clone(),
            max_messages: config.receive_batch(),
            wait_time_secs: config.receive_wait(),
        },
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    run_pool(worker, config.worker_count(), shutdown_rx).await;

    info!("csv-processor stopped");
    Ok(())
}

/// Completes on SIGINT or, on unix, SIGTERM (what the container runtime
/// sends on scale-in).
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
