//! Producer-side facade over the submission queue.
//!
//! Turns the failures observed by the indexing, processing and input paths
//! into batches and applies the processing-failure policy: whether failed
//! messages are routed to the handlers at all, and whether they also continue
//! down the pipeline or are acknowledged by the failure service instead.

use std::sync::Arc;
use tracing::error;

use crate::ack::Acknowledgeable;
use crate::config::FailureHandlingConfig;
use crate::failure::{
    FailureBatch, IndexingFailure, InputFailure, ProcessingError, ProcessingFailure,
    ProcessingFailureCause,
};
use crate::queue::FailureSubmissionQueue;

/// Submits failures on behalf of producers.
#[derive(Clone)]
pub struct FailureSubmitter {
    queue: Arc<FailureSubmissionQueue>,
    submit_processing_failures: bool,
    keep_failed_message_duplicate: bool,
}

impl FailureSubmitter {
    pub fn new(queue: Arc<FailureSubmissionQueue>, config: &FailureHandlingConfig) -> Self {
        Self {
            queue,
            submit_processing_failures: config.submit_processing_failures,
            keep_failed_message_duplicate: config.keep_failed_message_duplicate,
        }
    }

    pub async fn submit_indexing_failures(&self, failures: Vec<IndexingFailure>) {
        if failures.is_empty() {
            return;
        }
        self.submit(FailureBatch::indexing(failures)).await;
    }

    /// Report processing errors of `message`.
    ///
    /// Returns whether the message should continue down the pipeline.
    pub async fn submit_processing_errors(
        &self,
        message: Arc<dyn Acknowledgeable>,
        errors: Vec<ProcessingError>,
    ) -> bool {
        if !self.submit_processing_failures || errors.is_empty() {
            return true;
        }

        let acknowledge = !self.keep_failed_message_duplicate;
        let failures = errors
            .into_iter()
            .map(|error| {
                ProcessingFailure::new(
                    error.cause,
                    error.message,
                    error.details,
                    Arc::clone(&message),
                    acknowledge,
                )
            })
            .collect();
        self.submit(FailureBatch::processing(failures)).await;

        self.keep_failed_message_duplicate
    }

    /// Report a processing failure without a known cause.
    pub async fn submit_unknown_processing_error(
        &self,
        message: Arc<dyn Acknowledgeable>,
        details: impl Into<String>,
    ) -> bool {
        let error = ProcessingError::new(
            ProcessingFailureCause::Unknown,
            "Failed to process message",
            details,
        );
        self.submit_processing_errors(message, vec![error]).await
    }

    pub async fn submit_input_failure(&self, failure: InputFailure) {
        self.submit(FailureBatch::input(vec![failure])).await;
    }

    async fn submit(&self, batch: FailureBatch) {
        if let Err(e) = self.queue.submit(batch).await {
            error!(error = %e, "Failed to submit failure batch");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::{FailureType, IndexingFailureCause, InputFailureCause};
    use crate::queue::FailureSource;
    use bytes::Bytes;
    use std::num::NonZeroUsize;

    #[derive(Debug)]
    struct Message;

    impl Acknowledgeable for Message {
        fn message_queue_id(&self) -> Option<&str> {
            Some("journal-1")
        }
    }

    fn submitter(submit: bool, keep_duplicate: bool) -> (FailureSubmitter, Arc<FailureSubmissionQueue>) {
        let queue = Arc::new(FailureSubmissionQueue::new(NonZeroUsize::new(8).unwrap()));
        let config = FailureHandlingConfig {
            submit_processing_failures: submit,
            keep_failed_message_duplicate: keep_duplicate,
            ..Default::default()
        };
        (FailureSubmitter::new(queue.clone(), &config), queue)
    }

    fn errors() -> Vec<ProcessingError> {
        vec![
            ProcessingError::new(ProcessingFailureCause::RuleConditionEvaluationError, "rule", "x"),
            ProcessingError::new(ProcessingFailureCause::ExtractorException, "extractor", "y"),
        ]
    }

    #[tokio::test]
    async fn test_processing_failures_disabled() {
        let (submitter, queue) = submitter(false, false);
        assert!(submitter.submit_processing_errors(Arc::new(Message), errors()).await);
        assert_eq!(queue.queue_size(), 0);
    }

    #[tokio::test]
    async fn test_keep_duplicate_submits_without_ack() {
        let (submitter, queue) = submitter(true, true);
        assert!(submitter.submit_processing_errors(Arc::new(Message), errors()).await);

        let batch = queue.consume().await.unwrap();
        assert_eq!(batch.failure_type(), FailureType::Processing);
        assert_eq!(batch.len(), 2);
        assert!(batch.acknowledgeables().is_empty());
    }

    #[tokio::test]
    async fn test_drop_duplicate_hands_ack_to_service() {
        let (submitter, queue) = submitter(true, false);
        assert!(!submitter.submit_unknown_processing_error(Arc::new(Message), "boom").await);

        let batch = queue.consume().await.unwrap();
        let failures = batch.processing_failures().unwrap();
        assert_eq!(failures[0].cause, ProcessingFailureCause::Unknown);
        assert_eq!(failures[0].details, "boom");
        assert_eq!(batch.acknowledgeables().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_inputs_produce_no_batch() {
        let (submitter, queue) = submitter(true, false);
        submitter.submit_indexing_failures(Vec::new()).await;
        assert!(submitter.submit_processing_errors(Arc::new(Message), Vec::new()).await);
        assert_eq!(queue.queue_size(), 0);
    }

    #[tokio::test]
    async fn test_indexing_and_input_batches() {
        let (submitter, queue) = submitter(false, true);
        submitter
            .submit_indexing_failures(vec![IndexingFailure::new(
                IndexingFailureCause::MappingError,
                "m",
                "d",
                "graylog_0",
            )])
            .await;
        submitter
            .submit_input_failure(InputFailure::new(
                InputFailureCause::InputParse,
                "m",
                "d",
                Bytes::from_static(b"?"),
                "stdin",
            ))
            .await;

        assert_eq!(queue.consume().await.unwrap().failure_type(), FailureType::Indexing);
        assert_eq!(queue.consume().await.unwrap().failure_type(), FailureType::Input);
    }
}
