//! Default fallback handler: write failures to the log.

use async_trait::async_trait;
use tracing::warn;

use crate::error::HandlerError;
use crate::failure::FailureBatch;

use super::FailureHandler;

/// Logs every failure of every batch at warn level.
#[derive(Debug, Clone)]
pub struct LogFailureHandler {
    enabled: bool,
}

impl LogFailureHandler {
    pub fn new() -> Self {
        Self { enabled: true }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }
}

impl Default for LogFailureHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FailureHandler for LogFailureHandler {
    fn name(&self) -> &str {
        "log"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn supports(&self, _batch: &FailureBatch) -> bool {
        true
    }

    async fn handle(&self, batch: &FailureBatch) -> Result<(), HandlerError> {
        for failure in batch.failures() {
            warn!(
                batch_id = batch.id(),
                failure_type = %failure.failure_type(),
                cause = failure.cause(),
                details = failure.details(),
                timestamp = %failure.timestamp(),
                "{}",
                failure.message()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::{IndexingFailure, IndexingFailureCause};
    use crate::handler::{FailureHandlers, Resolution};

    #[tokio::test]
    async fn test_logs_any_batch() {
        let handler = LogFailureHandler::new();
        let batch = FailureBatch::indexing(vec![IndexingFailure::new(
            IndexingFailureCause::MappingError,
            "failed to parse field",
            "",
            "graylog_0",
        )]);
        assert!(handler.is_enabled());
        assert!(handler.supports(&batch));
        handler.handle(&batch).await.unwrap();
    }

    #[test]
    fn test_disabled_fallback_is_not_resolved() {
        let handlers = FailureHandlers::new(LogFailureHandler::disabled());
        let batch = FailureBatch::input(Vec::new());
        assert!(matches!(handlers.resolve(&batch), Resolution::Unroutable));
    }
}
