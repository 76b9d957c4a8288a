//! provision-pipeline: one-shot wiring of the notification graph.
//!
//! Creates the SNS topic, the SQS queue with its visibility timeout, the
//! topic-to-queue subscription and queue policy, and, when a bucket is
//! configured, the bucket notification with the suffix filter. Safe to run
//! repeatedly; every step is an idempotent create-or-reuse.
//!
//! ## Configuration
//! - CSV_PROCESSOR__ROUTING__BUCKET: bucket to wire (optional)
//! - CSV_PROCESSOR__ROUTING__TOPIC_NAME: notification topic
//! - AWS_REGION / endpoint_url: target region or LocalStack endpoint

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use csv_processor::config::{Config, LOG_ENV_VAR};
use csv_processor::provision::Provisioner;

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

    let mut aws_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(ref region) = config.region {
        aws_loader = aws_loader.region(aws_config::Region::new(region.clone()));
    }
    if let Some(ref endpoint) = config.endpoint_url {
        aws_loader = aws_loader.endpoint_url(endpoint);
    }
    let aws_config = aws_loader.load().await;

    let provisioner = Provisioner::new(
        aws_sdk_sns::Client::new(&aws_config),
        aws_sdk_sqs::Client::new(&aws_config),
        aws_sdk_s3::Client::new(&aws_config),
    );

    let endpoints = provisioner.provision(&config).await?;

    info!(
        topic_arn = %endpoints.topic_arn,
        queue_url = %endpoints.queue_url,
        queue_arn = %endpoints.queue_arn,
        "Pipeline provisioned"
    );
    Ok(())
}
