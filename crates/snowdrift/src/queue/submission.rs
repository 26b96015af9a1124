//! Bounded FIFO between failure producers and the dispatch service.

use async_trait::async_trait;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

use snowdrift_core::emit;
use snowdrift_core::metrics::events::{FailureBatchSubmitted, FailureQueueDepth};

use crate::error::QueueError;
use crate::failure::FailureBatch;

use super::FailureSource;

/// Bounded, thread-safe queue of failure batches.
///
/// Producers block when the queue is full, which pushes back on whatever
/// generates failures. Batches are consumed in submission order.
pub struct FailureSubmissionQueue {
    tx: mpsc::Sender<FailureBatch>,
    rx: Mutex<mpsc::Receiver<FailureBatch>>,
}

impl FailureSubmissionQueue {
    pub fn new(capacity: NonZeroUsize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.get());
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Enqueue a batch, waiting while the queue is full.
    pub async fn submit(&self, batch: FailureBatch) -> Result<(), QueueError> {
        let (failure_type, failures) = (batch.failure_type().as_str(), batch.len());
        self.tx
            .send(batch)
            .await
            .map_err(|_| QueueError::QueueClosed {
                failure_type,
                failures,
            })?;
        self.record_submitted(failure_type, failures);
        Ok(())
    }

    /// Enqueue a batch from a thread outside the async runtime.
    ///
    /// Panics if called from within an async execution context.
    pub fn submit_blocking(&self, batch: FailureBatch) -> Result<(), QueueError> {
        let (failure_type, failures) = (batch.failure_type().as_str(), batch.len());
        self.tx
            .blocking_send(batch)
            .map_err(|_| QueueError::QueueClosed {
                failure_type,
                failures,
            })?;
        self.record_submitted(failure_type, failures);
        Ok(())
    }

    /// Number of batches currently buffered.
    pub fn queue_size(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    fn record_submitted(&self, failure_type: &'static str, failures: usize) {
        emit!(FailureBatchSubmitted {
            failure_type,
            failures,
        });
        emit!(FailureQueueDepth {
            depth: self.queue_size(),
        });
    }
}

#[async_trait]
impl FailureSource for FailureSubmissionQueue {
    async fn consume(&self) -> Option<FailureBatch> {
        let batch = self.rx.lock().await.recv().await;
        emit!(FailureQueueDepth {
            depth: self.queue_size(),
        });
        batch
    }

    async fn consume_with_timeout(&self, timeout: Duration) -> Option<FailureBatch> {
        tokio::time::timeout(timeout, self.consume())
            .await
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::{IndexingFailure, IndexingFailureCause};
    use std::sync::Arc;

    fn batch(message: &str) -> FailureBatch {
        FailureBatch::indexing(vec![IndexingFailure::new(
            IndexingFailureCause::MappingError,
            message,
            "",
            "graylog_0",
        )])
    }

    fn queue(capacity: usize) -> FailureSubmissionQueue {
        FailureSubmissionQueue::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[tokio::test]
    async fn test_fifo_order_and_size() {
        let queue = queue(4);
        let first = batch("first");
        let second = batch("second");

        queue.submit(first.clone()).await.unwrap();
        queue.submit(second.clone()).await.unwrap();
        assert_eq!(queue.queue_size(), 2);
        assert_eq!(queue.capacity(), 4);

        assert_eq!(queue.consume().await, Some(first));
        assert_eq!(queue.consume().await, Some(second));
        assert_eq!(queue.queue_size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_with_timeout_returns_none_when_empty() {
        let queue = queue(1);
        let result = queue.consume_with_timeout(Duration::from_millis(50)).await;
        assert!(result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_waits_while_full() {
        let queue = Arc::new(queue(1));
        queue.submit(batch("a")).await.unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.submit(batch("b")).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!producer.is_finished());
        assert_eq!(queue.queue_size(), 1);

        assert!(queue.consume().await.is_some());
        producer.await.unwrap().unwrap();
        assert_eq!(queue.queue_size(), 1);
    }

    #[test]
    fn test_submit_blocking_from_plain_thread() {
        let queue = Arc::new(queue(2));
        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.submit_blocking(batch("threaded")))
        };
        producer.join().unwrap().unwrap();
        assert_eq!(queue.queue_size(), 1);
    }
}
