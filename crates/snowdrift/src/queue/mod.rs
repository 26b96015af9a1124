//! Failure submission queue.

mod source;
mod submission;

pub use source::FailureSource;
pub use submission::FailureSubmissionQueue;
