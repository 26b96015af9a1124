//! Failure taxonomy.
//!
//! A failure describes one problem with one message (or raw payload), tagged
//! with its origin. Producers group failures of the same origin into a
//! [`FailureBatch`], the unit that travels through the submission queue and
//! is handed to handlers.

mod batch;
mod cause;
mod types;

pub use batch::FailureBatch;
pub use cause::{FailureType, IndexingFailureCause, InputFailureCause, ProcessingFailureCause};
pub use types::{Failure, IndexingFailure, InputFailure, ProcessingError, ProcessingFailure};
