//! Failure handlers.
//!
//! A handler is a pluggable sink for failure batches. The dispatch service
//! asks the [`FailureHandlers`] registry which handlers should receive a
//! batch: all enabled custom handlers that support it, otherwise the
//! fallback, otherwise nobody.

mod dead_letter;
mod logging;
mod registry;

pub use dead_letter::{DeadLetterHandler, DeadLetterStats};
pub use logging::LogFailureHandler;
pub use registry::{FailureHandlers, Resolution};

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::HandlerError;
use crate::failure::FailureBatch;

/// A shared, type-erased failure handler.
pub type FailureHandlerRef = Arc<dyn FailureHandler>;

/// A sink for failure batches.
///
/// `is_enabled` and `supports` are consulted for every batch and must be
/// cheap. `handle` may be invoked concurrently for different batches.
#[async_trait]
pub trait FailureHandler: Send + Sync {
    /// Name used in logs and metric labels.
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    /// Whether this handler accepts the batch.
    fn supports(&self, batch: &FailureBatch) -> bool;

    async fn handle(&self, batch: &FailureBatch) -> Result<(), HandlerError>;
}
