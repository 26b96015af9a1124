//! Per-batch dispatch: handler resolution, isolated invocation and
//! acknowledgment.

use futures::FutureExt;
use futures::future::join_all;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, error};

use snowdrift_core::emit;
use snowdrift_core::metrics::events::{
    AcknowledgeFailed, FailureBatchDropped, FailureBatchHandled, HandlerStatus,
    MessagesAcknowledged,
};

use crate::ack::MessageQueueAcknowledger;
use crate::failure::FailureBatch;
use crate::handler::{FailureHandlerRef, FailureHandlers, Resolution};

/// Counters describing what the dispatcher did so far.
#[derive(Debug, Default)]
pub struct DispatchStats {
    processed: AtomicU64,
    dropped: AtomicU64,
    handler_errors: AtomicU64,
    acknowledged: AtomicU64,
    acknowledge_errors: AtomicU64,
}

impl DispatchStats {
    /// Batches that went through dispatch, routed or not. Empty batches are
    /// not counted.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    /// Batches no handler claimed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Acquire)
    }

    /// Handler invocations that returned an error or panicked.
    pub fn handler_errors(&self) -> u64 {
        self.handler_errors.load(Ordering::Acquire)
    }

    /// Messages passed to successful acknowledger calls.
    pub fn acknowledged(&self) -> u64 {
        self.acknowledged.load(Ordering::Acquire)
    }

    /// Acknowledger calls that failed.
    pub fn acknowledge_errors(&self) -> u64 {
        self.acknowledge_errors.load(Ordering::Acquire)
    }
}

pub(crate) struct Dispatcher {
    handlers: FailureHandlers,
    acknowledger: Arc<dyn MessageQueueAcknowledger>,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    pub(crate) fn new(
        handlers: FailureHandlers,
        acknowledger: Arc<dyn MessageQueueAcknowledger>,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            handlers,
            acknowledger,
            stats,
        }
    }

    /// Route one batch and acknowledge its eligible messages.
    ///
    /// Never fails: handler and acknowledger problems are logged and counted.
    pub(crate) async fn dispatch(&self, batch: FailureBatch) {
        if batch.is_empty() {
            debug!(batch_id = batch.id(), "Skipping empty failure batch");
            return;
        }

        match self.handlers.resolve(&batch) {
            Resolution::Unroutable => {
                debug!(
                    batch_id = batch.id(),
                    failure_type = %batch.failure_type(),
                    failures = batch.len(),
                    "No enabled handler supports failure batch, dropping it"
                );
                self.stats.dropped.fetch_add(1, Ordering::AcqRel);
                emit!(FailureBatchDropped {
                    failure_type: batch.failure_type().as_str(),
                    failures: batch.len(),
                });
            }
            resolution => {
                join_all(
                    resolution
                        .handlers()
                        .iter()
                        .map(|handler| self.invoke(handler, &batch)),
                )
                .await;
            }
        }

        self.acknowledge(&batch).await;
        self.stats.processed.fetch_add(1, Ordering::AcqRel);
    }

    async fn invoke(&self, handler: &FailureHandlerRef, batch: &FailureBatch) {
        let start = Instant::now();
        let result = AssertUnwindSafe(handler.handle(batch)).catch_unwind().await;

        let status = match result {
            Ok(Ok(())) => HandlerStatus::Success,
            Ok(Err(e)) => {
                error!(
                    handler = handler.name(),
                    batch_id = batch.id(),
                    error = %e,
                    "Failure handler returned an error"
                );
                HandlerStatus::Error
            }
            Err(panic) => {
                error!(
                    handler = handler.name(),
                    batch_id = batch.id(),
                    panic = panic_message(&*panic),
                    "Failure handler panicked"
                );
                HandlerStatus::Panicked
            }
        };

        if status != HandlerStatus::Success {
            self.stats.handler_errors.fetch_add(1, Ordering::AcqRel);
        }
        emit!(FailureBatchHandled {
            handler: handler.name().to_string(),
            failure_type: batch.failure_type().as_str(),
            status,
            duration: start.elapsed(),
        });
    }

    async fn acknowledge(&self, batch: &FailureBatch) {
        let messages = batch.acknowledgeables();
        if messages.is_empty() {
            return;
        }

        let count = messages.len();
        let result = AssertUnwindSafe(self.acknowledger.acknowledge(messages))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(())) => {
                debug!(batch_id = batch.id(), count, "Acknowledged failed messages");
                self.stats
                    .acknowledged
                    .fetch_add(count as u64, Ordering::AcqRel);
                emit!(MessagesAcknowledged { count });
            }
            Ok(Err(e)) => {
                error!(batch_id = batch.id(), count, error = %e, "Failed to acknowledge messages");
                self.stats.acknowledge_errors.fetch_add(1, Ordering::AcqRel);
                emit!(AcknowledgeFailed { count });
            }
            Err(panic) => {
                error!(
                    batch_id = batch.id(),
                    count,
                    panic = panic_message(&*panic),
                    "Acknowledger panicked"
                );
                self.stats.acknowledge_errors.fetch_add(1, Ordering::AcqRel);
                emit!(AcknowledgeFailed { count });
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::{Acknowledgeable, NoopAcknowledger};
    use crate::error::{AcknowledgeError, HandlerError};
    use crate::failure::{ProcessingFailure, ProcessingFailureCause};
    use crate::handler::FailureHandler;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct Message;

    impl Acknowledgeable for Message {
        fn message_queue_id(&self) -> Option<&str> {
            None
        }
    }

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FailureHandler for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn supports(&self, _batch: &FailureBatch) -> bool {
            true
        }

        async fn handle(&self, _batch: &FailureBatch) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Rejecting;

    #[async_trait]
    impl MessageQueueAcknowledger for Rejecting {
        async fn acknowledge(
            &self,
            messages: Vec<Arc<dyn Acknowledgeable>>,
        ) -> Result<(), AcknowledgeError> {
            Err(AcknowledgeError::Rejected {
                count: messages.len(),
                message: "journal unavailable".to_string(),
            })
        }
    }

    struct Panicking;

    #[async_trait]
    impl MessageQueueAcknowledger for Panicking {
        async fn acknowledge(
            &self,
            _messages: Vec<Arc<dyn Acknowledgeable>>,
        ) -> Result<(), AcknowledgeError> {
            panic!("journal client crashed");
        }
    }

    fn processing_batch() -> FailureBatch {
        FailureBatch::processing(vec![ProcessingFailure::new(
            ProcessingFailureCause::Unknown,
            "m",
            "d",
            Arc::new(Message),
            true,
        )])
    }

    #[tokio::test]
    async fn test_empty_batch_is_skipped() {
        let handler = Arc::new(Counting::default());
        let stats = Arc::new(DispatchStats::default());
        let dispatcher = Dispatcher::new(
            FailureHandlers::from_fallback(handler.clone()),
            Arc::new(NoopAcknowledger),
            stats.clone(),
        );

        dispatcher.dispatch(FailureBatch::processing(Vec::new())).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(stats.processed(), 0);
    }

    #[tokio::test]
    async fn test_acknowledger_error_is_counted() {
        let handler = Arc::new(Counting::default());
        let stats = Arc::new(DispatchStats::default());
        let dispatcher = Dispatcher::new(
            FailureHandlers::from_fallback(handler.clone()),
            Arc::new(Rejecting),
            stats.clone(),
        );

        dispatcher.dispatch(processing_batch()).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.processed(), 1);
        assert_eq!(stats.acknowledged(), 0);
        assert_eq!(stats.acknowledge_errors(), 1);
    }

    #[tokio::test]
    async fn test_acknowledger_panic_is_counted() {
        let handler = Arc::new(Counting::default());
        let stats = Arc::new(DispatchStats::default());
        let dispatcher = Dispatcher::new(
            FailureHandlers::from_fallback(handler.clone()),
            Arc::new(Panicking),
            stats.clone(),
        );

        dispatcher.dispatch(processing_batch()).await;
        dispatcher.dispatch(processing_batch()).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        assert_eq!(stats.processed(), 2);
        assert_eq!(stats.acknowledged(), 0);
        assert_eq!(stats.acknowledge_errors(), 2);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(&*payload), "static message");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(&*payload), "owned message");
        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(&*payload), "unknown panic payload");
    }
}
