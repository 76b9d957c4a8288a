//! Application configuration.
//!
//! Loaded from an optional YAML file plus environment variables. The plain
//! env vars the deployment supplies to the container (`QUEUE_URL`,
//! `TABLE_NAME`, `AWS_REGION`) take effect through the unprefixed
//! environment source, matching the task definition's environment block.

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "CSV_PROCESSOR_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "CSV_PROCESSOR";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "CSV_PROCESSOR_LOG";
/// Environment variable for the work queue URL.
pub const QUEUE_URL_ENV_VAR: &str = "QUEUE_URL";
/// Environment variable for the row table name.
pub const TABLE_NAME_ENV_VAR: &str = "TABLE_NAME";
/// Environment variable for the AWS region.
pub const AWS_REGION_ENV_VAR: &str = "AWS_REGION";

/// SQS caps a single receive call at ten messages.
pub const MAX_RECEIVE_BATCH: i32 = 10;
/// SQS caps long polling at twenty seconds.
pub const MAX_WAIT_TIME_SECS: i32 = 20;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Work queue URL. When unset, the queue is resolved by `queue_name`.
    pub queue_url: Option<String>,
    /// Work queue name, used when no URL is configured.
    pub queue_name: String,
    /// Row table name.
    pub table_name: String,
    /// CSV column holding the row identifier (table partition key).
    pub id_field: String,
    /// AWS region. Falls back to `AWS_REGION`, then the default provider chain.
    pub region: Option<String>,
    /// Custom endpoint URL (for LocalStack or testing).
    pub endpoint_url: Option<String>,
    /// Visibility timeout in seconds applied when provisioning the queue.
    pub visibility_timeout_secs: i32,
    /// Wait time seconds for long polling.
    pub wait_time_secs: i32,
    /// Max number of messages to receive in one poll.
    pub max_messages: i32,
    /// Number of concurrent worker loops.
    pub concurrency: usize,
    /// Notification routing (provisioning only).
    pub routing: RoutingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_url: None,
            queue_name: "csv-process-queue".to_string(),
            table_name: "Personas".to_string(),
            id_field: "id".to_string(),
            region: None,
            endpoint_url: None,
            visibility_timeout_secs: 60,
            wait_time_secs: 20,
            max_messages: MAX_RECEIVE_BATCH,
            concurrency: 2,
            routing: RoutingConfig::default(),
        }
    }
}

/// Notification routing configuration, consumed by the provisioner.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// SNS topic receiving bucket notifications.
    pub topic_name: String,
    /// Bucket to wire notifications for. When unset, bucket wiring is skipped.
    pub bucket: Option<String>,
    /// Object key suffix filter for upload notifications.
    pub suffix: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            topic_name: "csv-upload-notifications".to_string(),
            bucket: None,
            suffix: ".csv".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    /// 5. Plain container env vars (`QUEUE_URL`, `TABLE_NAME`, ...)
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            // Plain container env vars (QUEUE_URL, TABLE_NAME) map directly
            // onto the lowercased field names.
            .add_source(Environment::default().try_parsing(true))
            .build()?;

        let mut config: Config = config.try_deserialize()?;

        // AWS_REGION doesn't match a field name, so resolve it explicitly.
        if config.region.is_none() {
            if let Ok(region) = std::env::var(AWS_REGION_ENV_VAR) {
                config.region = Some(region);
            }
        }

        Ok(config)
    }

    /// Receive batch size, clamped to the SQS limit.
    pub fn receive_batch(&self) -> i32 {
        self.max_messages.clamp(1, MAX_RECEIVE_BATCH)
    }

    /// Long-polling wait, clamped to the SQS limit. An out-of-range value
    /// would fail every receive call instead of slowing the poll.
    pub fn receive_wait(&self) -> i32 {
        self.wait_time_secs.clamp(0, MAX_WAIT_TIME_SECS)
    }

    /// Number of worker loops, at least one.
    pub fn worker_count(&self) -> usize {
        self.concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.queue_name, "csv-process-queue");
        assert_eq!(config.table_name, "Personas");
        assert_eq!(config.id_field, "id");
        assert_eq!(config.visibility_timeout_secs, 60);
        assert_eq!(config.concurrency, 2);
        assert!(config.queue_url.is_none());
        assert_eq!(config.routing.suffix, ".csv");
    }

    #[test]
    fn test_receive_batch_clamped() {
        let mut config = Config::default();
        config.max_messages = 50;
        assert_eq!(config.receive_batch(), MAX_RECEIVE_BATCH);

        config.max_messages = 0;
        assert_eq!(config.receive_batch(), 1);

        config.max_messages = 5;
        assert_eq!(config.receive_batch(), 5);
    }

    #[test]
    fn test_receive_wait_clamped() {
        let mut config = Config::default();
        config.wait_time_secs = 60;
        assert_eq!(config.receive_wait(), MAX_WAIT_TIME_SECS);

        config.wait_time_secs = -1;
        assert_eq!(config.receive_wait(), 0);

        config.wait_time_secs = 10;
        assert_eq!(config.receive_wait(), 10);
    }

    #[test]
    fn test_worker_count_at_least_one() {
        let mut config = Config::default();
        config.concurrency = 0;
        assert_eq!(config.worker_count(), 1);
    }
}
