//! snowdrift: failure handling for log ingestion.
//!
//! Producers anywhere in an ingestion pipeline report indexing rejections,
//! processing errors and undecodable input as failure batches. Batches are
//! buffered in a bounded queue and dispatched by [`FailureHandlingService`]
//! to pluggable [`FailureHandler`]s, after which the originating messages
//! are acknowledged where the producer asked for it.
//!
//! - `failure` - failure taxonomy and batches
//! - `queue` - bounded submission queue
//! - `handler` - handler capability, registry and built-in handlers
//! - `service` - dispatch service and lifecycle
//! - `submit` - producer-side facade
//! - `input`/`app` - the stdin-driven binary

pub mod ack;
pub mod app;
pub mod config;
pub mod error;
pub mod failure;
pub mod handler;
pub mod input;
pub mod queue;
pub mod service;
pub mod submit;

pub use ack::{Acknowledgeable, MessageQueueAcknowledger, NoopAcknowledger};
pub use config::{Config, DeadLetterConfig, FailureHandlingConfig, HandlerRole};
pub use error::{AcknowledgeError, AppError, DlqError, HandlerError, QueueError, ServiceError};
pub use failure::{
    Failure, FailureBatch, FailureType, IndexingFailure, IndexingFailureCause, InputFailure,
    InputFailureCause, ProcessingError, ProcessingFailure, ProcessingFailureCause,
};
pub use handler::{
    DeadLetterHandler, FailureHandler, FailureHandlerRef, FailureHandlers, LogFailureHandler,
    Resolution,
};
pub use queue::{FailureSource, FailureSubmissionQueue};
pub use service::{DispatchStats, FailureHandlingService, ServiceState};
pub use submit::FailureSubmitter;

pub use snowdrift_core::{CliArgs, init_tracing};
