//! Individual failure records.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::ack::Acknowledgeable;

use super::cause::{FailureType, IndexingFailureCause, InputFailureCause, ProcessingFailureCause};

/// Common view over a single failure occurrence.
pub trait Failure: Send + Sync {
    fn failure_type(&self) -> FailureType;

    /// Cause label from the origin-specific cause enumeration.
    fn cause(&self) -> &'static str;

    /// Short human-readable description.
    fn message(&self) -> &str;

    /// Longer diagnostic text.
    fn details(&self) -> &str;

    /// When the failure was detected.
    fn timestamp(&self) -> DateTime<Utc>;

    /// Whether the originating message should be acknowledged once handled.
    fn requires_acknowledgement(&self) -> bool {
        false
    }
}

/// A message the search engine refused to index.
#[derive(Debug, Clone)]
pub struct IndexingFailure {
    pub cause: IndexingFailureCause,
    pub message: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    /// Identifier of the rejected message, when the indexer reported one.
    pub message_id: Option<String>,
    /// Index the message was written to.
    pub target_index: String,
}

impl IndexingFailure {
    pub fn new(
        cause: IndexingFailureCause,
        message: impl Into<String>,
        details: impl Into<String>,
        target_index: impl Into<String>,
    ) -> Self {
        Self {
            cause,
            message: message.into(),
            details: details.into(),
            timestamp: Utc::now(),
            message_id: None,
            target_index: target_index.into(),
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}

impl Failure for IndexingFailure {
    fn failure_type(&self) -> FailureType {
        FailureType::Indexing
    }

    fn cause(&self) -> &'static str {
        self.cause.as_str()
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn details(&self) -> &str {
        &self.details
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// A processing stage (rules, extractors, filters) failed on a message.
#[derive(Debug, Clone)]
pub struct ProcessingFailure {
    pub cause: ProcessingFailureCause,
    pub message: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    /// The message that failed processing.
    pub failed_message: Arc<dyn Acknowledgeable>,
    /// Set by the producer when the failure service owns acknowledgment of
    /// `failed_message`.
    pub acknowledge: bool,
}

impl ProcessingFailure {
    pub fn new(
        cause: ProcessingFailureCause,
        message: impl Into<String>,
        details: impl Into<String>,
        failed_message: Arc<dyn Acknowledgeable>,
        acknowledge: bool,
    ) -> Self {
        Self {
            cause,
            message: message.into(),
            details: details.into(),
            timestamp: Utc::now(),
            failed_message,
            acknowledge,
        }
    }
}

impl Failure for ProcessingFailure {
    fn failure_type(&self) -> FailureType {
        FailureType::Processing
    }

    fn cause(&self) -> &'static str {
        self.cause.as_str()
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn details(&self) -> &str {
        &self.details
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn requires_acknowledgement(&self) -> bool {
        self.acknowledge
    }
}

/// An input received a payload it could not decode.
#[derive(Debug, Clone)]
pub struct InputFailure {
    pub cause: InputFailureCause,
    pub message: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    /// The undecoded payload.
    pub raw_message: Bytes,
    /// Input that received the payload.
    pub input_id: String,
}

impl InputFailure {
    pub fn new(
        cause: InputFailureCause,
        message: impl Into<String>,
        details: impl Into<String>,
        raw_message: Bytes,
        input_id: impl Into<String>,
    ) -> Self {
        Self {
            cause,
            message: message.into(),
            details: details.into(),
            timestamp: Utc::now(),
            raw_message,
            input_id: input_id.into(),
        }
    }
}

impl Failure for InputFailure {
    fn failure_type(&self) -> FailureType {
        FailureType::Input
    }

    fn cause(&self) -> &'static str {
        self.cause.as_str()
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn details(&self) -> &str {
        &self.details
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// A processing error attached to a message by a pipeline stage, before it
/// is turned into a [`ProcessingFailure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingError {
    pub cause: ProcessingFailureCause,
    pub message: String,
    pub details: String,
}

impl ProcessingError {
    pub fn new(
        cause: ProcessingFailureCause,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            cause,
            message: message.into(),
            details: details.into(),
        }
    }
}
