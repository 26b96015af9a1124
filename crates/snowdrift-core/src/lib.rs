//! snowdrift-core: Shared infrastructure for the snowdrift failure pipeline.
//!
//! This crate contains the ambient pieces the failure-handling service is
//! built on:
//!
//! - `config/` - YAML loading, environment variable interpolation, CLI args
//! - `metrics/` - Prometheus metrics infrastructure and internal events
//! - `storage` - Object storage abstraction used by the dead-letter sink
//! - `signal` - Signal handling for graceful shutdown
//! - `tracing` - Subscriber initialization
//! - `error` - Common error types

pub mod config;
pub mod error;
pub mod metrics;
pub mod signal;
pub mod storage;
pub mod tracing;

// Re-export commonly used items
pub use config::{CliArgs, MetricsConfig, interpolate, load_yaml};
pub use error::{ConfigError, MetricsError, StorageError};
pub use metrics::{DEFAULT_METRICS_ADDR, MetricsController, init_global as init_metrics};
pub use signal::shutdown_signal;
pub use storage::{StorageProvider, StorageProviderRef};
pub use tracing::init_tracing;
