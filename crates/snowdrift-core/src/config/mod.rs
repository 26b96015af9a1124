//! Common configuration types and YAML loading.

mod args;
mod vars;

pub use args::CliArgs;
pub use vars::interpolate;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::Path;

use crate::error::{ConfigError, ReadFileSnafu, UnsupportedFormatSnafu, YamlParseSnafu};
use crate::metrics::DEFAULT_METRICS_ADDR;

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether the metrics endpoint is started (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_address() -> String {
    DEFAULT_METRICS_ADDR.to_string()
}

/// Check if a path has a YAML extension.
pub fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

/// Interpolate environment variables in `contents` and deserialize the result.
pub fn parse_yaml<T: DeserializeOwned>(contents: &str) -> Result<T, ConfigError> {
    let text = interpolate(contents)?;
    serde_yaml::from_str(&text).context(YamlParseSnafu)
}

/// Load a YAML configuration file.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    ensure!(is_yaml_file(path), UnsupportedFormatSnafu { path });

    let contents = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
    parse_yaml(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_yaml_file() {
        assert!(is_yaml_file(Path::new("snowdrift.yaml")));
        assert!(is_yaml_file(Path::new("snowdrift.yml")));
        assert!(!is_yaml_file(Path::new("snowdrift.toml")));
        assert!(!is_yaml_file(Path::new("README")));
    }

    #[test]
    fn test_metrics_defaults() {
        let config: MetricsConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.enabled);
        assert_eq!(config.address, DEFAULT_METRICS_ADDR);
    }

    #[test]
    fn test_metrics_rejects_unknown_fields() {
        assert!(serde_yaml::from_str::<MetricsConfig>("port: 9090").is_err());
    }

    #[test]
    fn test_load_yaml_rejects_other_extensions() {
        let err = load_yaml::<MetricsConfig>(Path::new("metrics.json")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_load_yaml_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "enabled: false\naddress: 127.0.0.1:9999").unwrap();

        let config: MetricsConfig = load_yaml(file.path()).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.address, "127.0.0.1:9999");
    }

    #[test]
    fn test_load_yaml_missing_file() {
        let err = load_yaml::<MetricsConfig>(Path::new("/nonexistent/snowdrift.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
