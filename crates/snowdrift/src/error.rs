//! Error types for the failure-handling service.

use snafu::prelude::*;

pub use snowdrift_core::error::{ConfigError, MetricsError, StorageError};

use crate::service::ServiceState;

/// Errors returned by a failure handler for a single batch.
///
/// The dispatch service logs and counts these; they never stop the service.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum HandlerError {
    /// Writing the batch to the dead-letter sink failed.
    #[snafu(display("Dead-letter write failed: {source}"))]
    DeadLetter { source: DlqError },

    /// Handler-specific failure.
    #[snafu(display("{message}"))]
    Failed { message: String },
}

impl HandlerError {
    /// Build a handler error from any displayable failure.
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed {
            message: message.into(),
        }
    }
}

impl From<DlqError> for HandlerError {
    fn from(source: DlqError) -> Self {
        HandlerError::DeadLetter { source }
    }
}

/// Errors returned by a message-queue acknowledger.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AcknowledgeError {
    /// The journal rejected the acknowledgment.
    #[snafu(display("Failed to acknowledge {count} messages: {message}"))]
    Rejected { count: usize, message: String },
}

/// Errors that can occur while writing dead-letter records.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DlqError {
    /// Failed to write a dead-letter object.
    #[snafu(display("Failed to write dead-letter object {path}: {source}"))]
    DeadLetterWrite { path: String, source: StorageError },

    /// Failed to serialize a dead-letter record.
    #[snafu(display("Failed to serialize dead-letter record: {source}"))]
    DeadLetterSerialize { source: serde_json::Error },

    /// Failed to create the dead-letter storage provider.
    #[snafu(display("Failed to create dead-letter storage at {url}: {source}"))]
    DeadLetterStorage { url: String, source: StorageError },
}

/// Lifecycle errors of the failure-handling service.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ServiceError {
    /// Operation not allowed in the current state.
    #[snafu(display("Cannot {operation} service in state {state}"))]
    InvalidState {
        operation: &'static str,
        state: ServiceState,
    },

    /// The service stopped before reaching the awaited state.
    #[snafu(display("Service reached {state} before it was running"))]
    NotRunning { state: ServiceState },

    /// The consumer task panicked or was aborted.
    #[snafu(display("Failure consumer task failed: {source}"))]
    TaskJoin { source: tokio::task::JoinError },
}

/// Top-level errors of the `snowdrift` binary.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Metrics error.
    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },

    /// Failed to parse metrics address.
    #[snafu(display("Failed to parse metrics address: {source}"))]
    AddressParse { source: std::net::AddrParseError },

    /// Dead-letter setup error.
    #[snafu(display("DLQ error: {source}"))]
    Dlq { source: DlqError },

    /// Service lifecycle error.
    #[snafu(display("Service error: {source}"))]
    Service { source: ServiceError },

    /// Reading the input or writing the output stream failed.
    #[snafu(display("Stream IO error: {source}"))]
    StreamIo { source: std::io::Error },
}

impl From<ConfigError> for AppError {
    fn from(source: ConfigError) -> Self {
        AppError::Config { source }
    }
}

impl From<MetricsError> for AppError {
    fn from(source: MetricsError) -> Self {
        AppError::Metrics { source }
    }
}

impl From<DlqError> for AppError {
    fn from(source: DlqError) -> Self {
        AppError::Dlq { source }
    }
}

impl From<ServiceError> for AppError {
    fn from(source: ServiceError) -> Self {
        AppError::Service { source }
    }
}

/// Errors returned when submitting to the failure queue.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueueError {
    /// The consuming side of the queue is gone.
    #[snafu(display("Failure queue is closed, dropped batch of {failures} {failure_type} failures"))]
    QueueClosed {
        failure_type: &'static str,
        failures: usize,
    },
}
