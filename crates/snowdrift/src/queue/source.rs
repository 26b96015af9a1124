//! Consumer side of the failure queue.

use async_trait::async_trait;
use std::time::Duration;

use crate::failure::FailureBatch;

/// Where the dispatch service takes batches from.
///
/// Implemented by [`FailureSubmissionQueue`](super::FailureSubmissionQueue);
/// tests substitute scripted sources.
#[async_trait]
pub trait FailureSource: Send + Sync {
    /// Wait for the next batch. Returns `None` once no batch can ever arrive.
    async fn consume(&self) -> Option<FailureBatch>;

    /// Wait at most `timeout` for the next batch.
    async fn consume_with_timeout(&self, timeout: Duration) -> Option<FailureBatch>;
}
