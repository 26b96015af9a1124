//! Message acknowledgment collaborators.
//!
//! Messages read from a journal or broker stay pending until something tells
//! the journal they are done. When a processing failure is routed here
//! instead of continuing down the pipeline, the failure service becomes that
//! something.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::error::AcknowledgeError;

/// A message that can be acknowledged against its originating queue.
pub trait Acknowledgeable: Send + Sync + fmt::Debug {
    /// Stable identifier of the message in its queue, if it came from one.
    fn message_queue_id(&self) -> Option<&str>;
}

/// Acknowledges fully handled messages against their originating queue.
///
/// Implementations must tolerate repeated acknowledgment of the same message.
#[async_trait]
pub trait MessageQueueAcknowledger: Send + Sync {
    async fn acknowledge(
        &self,
        messages: Vec<Arc<dyn Acknowledgeable>>,
    ) -> Result<(), AcknowledgeError>;
}

/// Acknowledger for deployments without a message journal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAcknowledger;

#[async_trait]
impl MessageQueueAcknowledger for NoopAcknowledger {
    async fn acknowledge(
        &self,
        messages: Vec<Arc<dyn Acknowledgeable>>,
    ) -> Result<(), AcknowledgeError> {
        trace!(count = messages.len(), "Skipping acknowledgment (no journal)");
        Ok(())
    }
}
