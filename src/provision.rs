//! Pipeline provisioning.
//!
//! Wires the static subscription graph: bucket notifications (suffix
//! filtered) to an SNS topic, topic to the SQS work queue. Every call is
//! an idempotent create-or-reuse, so provisioning can run repeatedly.
//! Intended for local development and bootstrap against LocalStack-style
//! endpoints; production topology is owned by the deployment layer.

use aws_sdk_s3::types::{
    Event, FilterRule, FilterRuleName, NotificationConfiguration, NotificationConfigurationFilter,
    S3KeyFilter, TopicConfiguration,
};
use aws_sdk_sqs::types::QueueAttributeName;
use tracing::info;

use crate::config::Config;

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Errors that can occur wiring the notification graph.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Topic setup failed: {0}")]
    Topic(String),

    #[error("Queue setup failed: {0}")]
    Queue(String),

    #[error("Subscription failed: {0}")]
    Subscription(String),

    #[error("Bucket notification failed: {0}")]
    BucketNotification(String),
}

/// Resolved endpoints of a provisioned pipeline.
#[derive(Debug, Clone)]
pub struct PipelineEndpoints {
    pub topic_arn: String,
    pub queue_url: String,
    pub queue_arn: String,
}

/// Creates and wires the notification path for one pipeline.
pub struct Provisioner {
    sns: aws_sdk_sns::Client,
    sqs: aws_sdk_sqs::Client,
    s3: aws_sdk_s3::Client,
}

impl Provisioner {
    pub fn new(
        sns: aws_sdk_sns::Client,
        sqs: aws_sdk_sqs::Client,
        s3: aws_sdk_s3::Client,
    ) -> Self {
        Self { sns, sqs, s3 }
    }

    /// Provision the full notification path described by `config`.
    ///
    /// Bucket wiring is skipped when no bucket is configured.
    pub async fn provision(&self, config: &Config) -> Result<PipelineEndpoints> {
        let topic_arn = self.create_topic(&config.routing.topic_name).await?;
        let queue_url = self
            .create_queue(&config.queue_name, config.visibility_timeout_secs)
            .await?;
        let queue_arn = self.queue_arn(&queue_url).await?;

        self.allow_topic_to_queue(&queue_url, &queue_arn, &topic_arn)
            .await?;
        self.subscribe_queue_to_topic(&queue_arn, &topic_arn).await?;

        if let Some(ref bucket) = config.routing.bucket {
            self.wire_bucket_notifications(bucket, &topic_arn, &config.routing.suffix)
                .await?;
        }

        info!(
            topic_arn = %topic_arn,
            queue_url = %queue_url,
            "Provisioned notification path"
        );

        Ok(PipelineEndpoints {
            topic_arn,
            queue_url,
            queue_arn,
        })
    }

    /// Create the SNS topic (idempotent - returns existing if already exists).
    async fn create_topic(&self, topic_name: &str) -> Result<String> {
        let result = self
            .sns
            .create_topic()
            .name(topic_name)
            .send()
            .await
            .map_err(|e| ProvisionError::Topic(format!("Failed to create SNS topic: {}", e)))?;

        let arn = result
            .topic_arn()
            .ok_or_else(|| ProvisionError::Topic("SNS create_topic returned no ARN".to_string()))?
            .to_string();

        info!(topic = %topic_name, arn = %arn, "Created/found SNS topic");
        Ok(arn)
    }

    /// Create the SQS queue with its visibility timeout (idempotent).
    async fn create_queue(&self, queue_name: &str, visibility_timeout_secs: i32) -> Result<String> {
        let result = self
            .sqs
            .create_queue()
            .queue_name(queue_name)
            .attributes(
                QueueAttributeName::VisibilityTimeout,
                visibility_timeout_secs.to_string(),
            )
            .send()
            .await
            .map_err(|e| ProvisionError::Queue(format!("Failed to create SQS queue: {}", e)))?;

        let url = result
            .queue_url()
            .ok_or_else(|| ProvisionError::Queue("SQS create_queue returned no URL".to_string()))?
            .to_string();

        info!(queue = %queue_name, url = %url, "Created/found SQS queue");
        Ok(url)
    }

    /// Look up the queue ARN.
    async fn queue_arn(&self, queue_url: &str) -> Result<String> {
        let attrs = self
            .sqs
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await
            .map_err(|e| ProvisionError::Queue(format!("Failed to get queue ARN: {}", e)))?;

        attrs
            .attributes()
            .and_then(|attrs| attrs.get(&QueueAttributeName::QueueArn))
            .cloned()
            .ok_or_else(|| ProvisionError::Queue("Queue has no ARN attribute".to_string()))
    }

    /// Grant the topic permission to send to the queue.
    async fn allow_topic_to_queue(
        &self,
        queue_url: &str,
        queue_arn: &str,
        topic_arn: &str,
    ) -> Result<()> {
        self.sqs
            .set_queue_attributes()
            .queue_url(queue_url)
            .attributes(
                QueueAttributeName::Policy,
                queue_policy(queue_arn, topic_arn),
            )
            .send()
            .await
            .map_err(|e| ProvisionError::Queue(format!("Failed to set queue policy: {}", e)))?;
        Ok(())
    }

    /// Subscribe the queue to the topic.
    ///
    /// Raw message delivery is left off: the queue body carries the SNS
    /// envelope, which the worker's double-envelope decoder handles.
    async fn subscribe_queue_to_topic(&self, queue_arn: &str, topic_arn: &str) -> Result<()> {
        self.sns
            .subscribe()
            .topic_arn(topic_arn)
            .protocol("sqs")
            .endpoint(queue_arn)
            .send()
            .await
            .map_err(|e| {
                ProvisionError::Subscription(format!("Failed to subscribe queue to topic: {}", e))
            })?;

        info!(queue_arn = %queue_arn, topic_arn = %topic_arn, "Subscribed queue to topic");
        Ok(())
    }

    /// Route object-created events matching the suffix to the topic.
    async fn wire_bucket_notifications(
        &self,
        bucket: &str,
        topic_arn: &str,
        suffix: &str,
    ) -> Result<()> {
        let suffix_rule = FilterRule::builder()
            .name(FilterRuleName::Suffix)
            .value(suffix)
            .build();

        let topic_config = TopicConfiguration::builder()
            .topic_arn(topic_arn)
            .events(Event::from("s3:ObjectCreated:*"))
            .filter(
                NotificationConfigurationFilter::builder()
                    .key(S3KeyFilter::builder().filter_rules(suffix_rule).build())
                    .build(),
            )
            .build()
            .map_err(|e| {
                ProvisionError::BucketNotification(format!(
                    "Failed to build topic configuration: {}",
                    e
                ))
            })?;

        self.s3
            .put_bucket_notification_configuration()
            .bucket(bucket)
            .notification_configuration(
                NotificationConfiguration::builder()
                    .topic_configurations(topic_config)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                ProvisionError::BucketNotification(format!(
                    "Failed to configure bucket notifications: {}",
                    e
                ))
            })?;

        info!(bucket = %bucket, suffix = %suffix, "Wired bucket notifications");
        Ok(())
    }
}

/// Queue policy allowing the topic to send messages to the queue.
fn queue_policy(queue_arn: &str, topic_arn: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "sns.amazonaws.com" },
            "Action": "sqs:SendMessage",
            "Resource": queue_arn,
            "Condition": { "ArnEquals": { "aws:SourceArn": topic_arn } }
        }]
    })
    .to_string()
}
