//! Type-homogeneous groups of failures.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ack::Acknowledgeable;

use super::cause::FailureType;
use super::types::{Failure, IndexingFailure, InputFailure, ProcessingFailure};

static NEXT_BATCH_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
enum Failures {
    Indexing(Vec<IndexingFailure>),
    Processing(Vec<ProcessingFailure>),
    Input(Vec<InputFailure>),
}

/// An immutable, ordered group of failures sharing one origin type.
///
/// The constructors tag the type, so a batch mixing origins cannot be built.
/// Every batch gets a process-unique id.
#[derive(Clone)]
pub struct FailureBatch {
    id: u64,
    failures: Failures,
}

impl FailureBatch {
    fn new(failures: Failures) -> Self {
        Self {
            id: NEXT_BATCH_ID.fetch_add(1, Ordering::Relaxed),
            failures,
        }
    }

    pub fn indexing(failures: Vec<IndexingFailure>) -> Self {
        Self::new(Failures::Indexing(failures))
    }

    pub fn processing(failures: Vec<ProcessingFailure>) -> Self {
        Self::new(Failures::Processing(failures))
    }

    pub fn input(failures: Vec<InputFailure>) -> Self {
        Self::new(Failures::Input(failures))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn failure_type(&self) -> FailureType {
        match &self.failures {
            Failures::Indexing(_) => FailureType::Indexing,
            Failures::Processing(_) => FailureType::Processing,
            Failures::Input(_) => FailureType::Input,
        }
    }

    pub fn len(&self) -> usize {
        match &self.failures {
            Failures::Indexing(f) => f.len(),
            Failures::Processing(f) => f.len(),
            Failures::Input(f) => f.len(),
        }
    }

    /// Empty batches are degenerate and are never dispatched.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn indexing_failures(&self) -> Option<&[IndexingFailure]> {
        match &self.failures {
            Failures::Indexing(f) => Some(f),
            _ => None,
        }
    }

    pub fn processing_failures(&self) -> Option<&[ProcessingFailure]> {
        match &self.failures {
            Failures::Processing(f) => Some(f),
            _ => None,
        }
    }

    pub fn input_failures(&self) -> Option<&[InputFailure]> {
        match &self.failures {
            Failures::Input(f) => Some(f),
            _ => None,
        }
    }

    /// Iterate over the failures in submission order.
    pub fn failures(&self) -> Box<dyn Iterator<Item = &dyn Failure> + '_> {
        match &self.failures {
            Failures::Indexing(f) => Box::new(f.iter().map(|f| f as &dyn Failure)),
            Failures::Processing(f) => Box::new(f.iter().map(|f| f as &dyn Failure)),
            Failures::Input(f) => Box::new(f.iter().map(|f| f as &dyn Failure)),
        }
    }

    /// Originating messages of the processing failures flagged for
    /// acknowledgment. Always empty for indexing and input batches.
    pub fn acknowledgeables(&self) -> Vec<Arc<dyn Acknowledgeable>> {
        match &self.failures {
            Failures::Processing(f) => f
                .iter()
                .filter(|failure| failure.acknowledge)
                .map(|failure| Arc::clone(&failure.failed_message))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl PartialEq for FailureBatch {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FailureBatch {}

impl fmt::Debug for FailureBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureBatch")
            .field("id", &self.id)
            .field("failure_type", &self.failure_type())
            .field("len", &self.len())
            .finish()
    }
}
