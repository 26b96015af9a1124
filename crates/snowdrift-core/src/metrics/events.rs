//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the failure
//! pipeline. Events implement the `InternalEvent` trait which records the
//! corresponding Prometheus metric.
//!
//! ## Labels
//!
//! - `failure_type`: origin of the failures in a batch (`indexing`,
//!   `processing`, `input`)
//! - `handler`: name of the failure handler involved

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Current number of batches buffered in the submission queue.
pub struct FailureQueueDepth {
    pub depth: usize,
}

impl InternalEvent for FailureQueueDepth {
    fn emit(self) {
        trace!(depth = self.depth, "Failure queue depth");
        gauge!("snowdrift_failure_queue_depth").set(self.depth as f64);
    }
}

/// Event emitted when a producer submits a failure batch.
pub struct FailureBatchSubmitted {
    pub failure_type: &'static str,
    pub failures: usize,
}

impl InternalEvent for FailureBatchSubmitted {
    fn emit(self) {
        trace!(failure_type = self.failure_type, failures = self.failures, "Failure batch submitted");
        counter!("snowdrift_failure_batches_submitted_total", "failure_type" => self.failure_type)
            .increment(1);
        counter!("snowdrift_failures_submitted_total", "failure_type" => self.failure_type)
            .increment(self.failures as u64);
    }
}

/// Outcome of a single handler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStatus {
    Success,
    Error,
    Panicked,
}

impl HandlerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerStatus::Success => "success",
            HandlerStatus::Error => "error",
            HandlerStatus::Panicked => "panicked",
        }
    }
}

/// Event emitted after a handler was invoked for a batch.
pub struct FailureBatchHandled {
    pub handler: String,
    pub failure_type: &'static str,
    pub status: HandlerStatus,
    pub duration: Duration,
}

impl InternalEvent for FailureBatchHandled {
    fn emit(self) {
        trace!(
            handler = %self.handler,
            failure_type = self.failure_type,
            status = self.status.as_str(),
            duration_ms = self.duration.as_millis(),
            "Failure batch handled"
        );
        counter!(
            "snowdrift_failure_batches_handled_total",
            "handler" => self.handler.clone(),
            "failure_type" => self.failure_type,
            "status" => self.status.as_str()
        )
        .increment(1);
        histogram!("snowdrift_failure_handler_duration_seconds", "handler" => self.handler)
            .record(self.duration.as_secs_f64());
    }
}

/// Event emitted when no enabled handler claims a batch.
pub struct FailureBatchDropped {
    pub failure_type: &'static str,
    pub failures: usize,
}

impl InternalEvent for FailureBatchDropped {
    fn emit(self) {
        trace!(failure_type = self.failure_type, failures = self.failures, "Failure batch dropped");
        counter!("snowdrift_failure_batches_dropped_total", "failure_type" => self.failure_type)
            .increment(1);
    }
}

/// Event emitted when originating messages are acknowledged.
pub struct MessagesAcknowledged {
    pub count: usize,
}

impl InternalEvent for MessagesAcknowledged {
    fn emit(self) {
        trace!(count = self.count, "Messages acknowledged");
        counter!("snowdrift_messages_acknowledged_total").increment(self.count as u64);
    }
}

/// Event emitted when the acknowledger rejects a call.
pub struct AcknowledgeFailed {
    pub count: usize,
}

impl InternalEvent for AcknowledgeFailed {
    fn emit(self) {
        trace!(count = self.count, "Acknowledge failed");
        counter!("snowdrift_acknowledge_errors_total").increment(1);
    }
}

/// Event emitted when the shutdown drain finishes.
pub struct FailureQueueDrained {
    pub batches: usize,
    pub duration: Duration,
}

impl InternalEvent for FailureQueueDrained {
    fn emit(self) {
        trace!(batches = self.batches, duration_ms = self.duration.as_millis(), "Failure queue drained");
        counter!("snowdrift_failure_batches_drained_total").increment(self.batches as u64);
        histogram!("snowdrift_failure_drain_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when dead-letter records are written.
pub struct DeadLetterRecordsWritten {
    pub records: usize,
    pub bytes: usize,
}

impl InternalEvent for DeadLetterRecordsWritten {
    fn emit(self) {
        trace!(records = self.records, bytes = self.bytes, "Dead-letter records written");
        counter!("snowdrift_dead_letter_records_total").increment(self.records as u64);
        counter!("snowdrift_dead_letter_bytes_total").increment(self.bytes as u64);
    }
}

/// Event emitted by the line input for every line it reads.
pub struct InputLineRead {
    pub status: InputLineStatus,
}

/// Whether an input line decoded successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLineStatus {
    Decoded,
    Failed,
}

impl InputLineStatus {
    fn as_str(&self) -> &'static str {
        match self {
            InputLineStatus::Decoded => "decoded",
            InputLineStatus::Failed => "failed",
        }
    }
}

impl InternalEvent for InputLineRead {
    fn emit(self) {
        trace!(status = self.status.as_str(), "Input line read");
        counter!("snowdrift_input_lines_total", "status" => self.status.as_str()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_status_labels() {
        assert_eq!(HandlerStatus::Success.as_str(), "success");
        assert_eq!(HandlerStatus::Error.as_str(), "error");
        assert_eq!(HandlerStatus::Panicked.as_str(), "panicked");
    }

    #[test]
    fn test_emit_without_recorder_is_noop() {
        crate::emit!(FailureQueueDepth { depth: 3 });
        crate::emit!(FailureBatchDropped {
            failure_type: "indexing",
            failures: 1,
        });
    }
}
