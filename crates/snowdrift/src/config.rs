//! Configuration for the snowdrift service.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use snowdrift_core::config::{load_yaml, parse_yaml};
use snowdrift_core::error::ConfigError;
use snowdrift_core::MetricsConfig;

use crate::failure::FailureType;

/// Main configuration for snowdrift.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Failure queue and dispatch settings.
    #[serde(default)]
    pub failure_handling: FailureHandlingConfig,
    /// Dead-letter sink; failures are only logged when absent.
    #[serde(default)]
    pub dead_letter: Option<DeadLetterConfig>,
    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Config = load_yaml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = parse_yaml(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.failure_handling.queue_capacity()?;
        if let Some(dead_letter) = &self.dead_letter
            && dead_letter.path.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue {
                field: "dead_letter.path".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Settings of the failure submission queue and the dispatch service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailureHandlingConfig {
    /// Maximum number of batches buffered before producers block (default: 1000).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Per-poll timeout while draining on shutdown (default: 3000).
    #[serde(default = "default_shutdown_await_ms")]
    pub shutdown_await_ms: u64,
    /// Whether processing errors are routed to the failure handlers at all.
    #[serde(default)]
    pub submit_processing_failures: bool,
    /// Whether a message that failed processing also continues down the
    /// pipeline. When false, the failure service acknowledges it instead.
    #[serde(default = "default_keep_failed_message_duplicate")]
    pub keep_failed_message_duplicate: bool,
}

impl Default for FailureHandlingConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            shutdown_await_ms: default_shutdown_await_ms(),
            submit_processing_failures: false,
            keep_failed_message_duplicate: default_keep_failed_message_duplicate(),
        }
    }
}

impl FailureHandlingConfig {
    /// Queue capacity, rejecting zero.
    pub fn queue_capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.queue_capacity).ok_or_else(|| ConfigError::InvalidValue {
            field: "failure_handling.queue_capacity".to_string(),
            message: "must be greater than 0".to_string(),
        })
    }

    pub fn shutdown_await(&self) -> Duration {
        Duration::from_millis(self.shutdown_await_ms)
    }
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_shutdown_await_ms() -> u64 {
    3000
}

fn default_keep_failed_message_duplicate() -> bool {
    true
}

/// Where the dead-letter handler sits in the handler set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerRole {
    /// Replaces the log handler as the fallback.
    #[default]
    Fallback,
    /// Registered as a custom handler, overriding the fallback for the
    /// failure types it supports.
    Custom,
}

/// Dead-letter sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeadLetterConfig {
    /// Local directory or object-store URL receiving NDJSON records.
    pub path: String,
    /// Storage options (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
    /// Failure types written to the sink; empty means all.
    #[serde(default)]
    pub failure_types: Vec<FailureType>,
    #[serde(default)]
    pub role: HandlerRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse("{}").unwrap();
        let failure_handling = &config.failure_handling;
        assert_eq!(failure_handling.queue_capacity, 1000);
        assert_eq!(failure_handling.shutdown_await(), Duration::from_secs(3));
        assert!(!failure_handling.submit_processing_failures);
        assert!(failure_handling.keep_failed_message_duplicate);
        assert!(config.dead_letter.is_none());
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
failure_handling:
  queue_capacity: 16
  shutdown_await_ms: 250
  submit_processing_failures: true
  keep_failed_message_duplicate: false
dead_letter:
  path: s3://bucket/dlq
  storage_options:
    aws_region: eu-west-1
  failure_types: [processing, input]
  role: custom
metrics:
  enabled: false
  address: 127.0.0.1:9999
"#;
        let config = Config::parse(yaml).unwrap();
        assert_eq!(config.failure_handling.queue_capacity().unwrap().get(), 16);
        assert_eq!(config.failure_handling.shutdown_await(), Duration::from_millis(250));
        assert!(config.failure_handling.submit_processing_failures);
        assert!(!config.failure_handling.keep_failed_message_duplicate);

        let dead_letter = config.dead_letter.unwrap();
        assert_eq!(dead_letter.path, "s3://bucket/dlq");
        assert_eq!(dead_letter.storage_options["aws_region"], "eu-west-1");
        assert_eq!(
            dead_letter.failure_types,
            vec![FailureType::Processing, FailureType::Input]
        );
        assert_eq!(dead_letter.role, HandlerRole::Custom);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = Config::parse("failure_handling:\n  queue_capacity: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "failure_handling.queue_capacity"));
    }

    #[test]
    fn test_rejects_empty_dead_letter_path() {
        let err = Config::parse("dead_letter:\n  path: \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "dead_letter.path"));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = Config::parse("failure_handling:\n  queue_size: 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::YamlParse { .. }));
    }
}
