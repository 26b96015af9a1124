//! Handler set and routing resolution.

use std::sync::Arc;

use crate::failure::FailureBatch;

use super::{FailureHandler, FailureHandlerRef};

/// Handlers chosen for one batch.
pub enum Resolution {
    /// Every enabled custom handler that supports the batch. Never empty.
    Custom(Vec<FailureHandlerRef>),
    /// No custom handler applies; the fallback takes the batch.
    Fallback(FailureHandlerRef),
    /// Nobody takes the batch.
    Unroutable,
}

impl Resolution {
    pub fn handlers(&self) -> &[FailureHandlerRef] {
        match self {
            Resolution::Custom(handlers) => handlers,
            Resolution::Fallback(handler) => std::slice::from_ref(handler),
            Resolution::Unroutable => &[],
        }
    }
}

/// The fixed set of handlers a service dispatches to: custom handlers plus
/// exactly one fallback.
#[derive(Clone)]
pub struct FailureHandlers {
    fallback: FailureHandlerRef,
    custom: Vec<FailureHandlerRef>,
}

impl FailureHandlers {
    pub fn new(fallback: impl FailureHandler + 'static) -> Self {
        Self::from_fallback(Arc::new(fallback))
    }

    pub fn from_fallback(fallback: FailureHandlerRef) -> Self {
        Self {
            fallback,
            custom: Vec::new(),
        }
    }

    /// Register a custom handler.
    pub fn with_custom(mut self, handler: FailureHandlerRef) -> Self {
        self.custom.push(handler);
        self
    }

    pub fn fallback(&self) -> &FailureHandlerRef {
        &self.fallback
    }

    pub fn custom(&self) -> &[FailureHandlerRef] {
        &self.custom
    }

    /// Pick the handlers for a batch.
    pub fn resolve(&self, batch: &FailureBatch) -> Resolution {
        let custom: Vec<_> = self
            .custom
            .iter()
            .filter(|handler| handler.is_enabled() && handler.supports(batch))
            .cloned()
            .collect();

        if !custom.is_empty() {
            Resolution::Custom(custom)
        } else if self.fallback.is_enabled() && self.fallback.supports(batch) {
            Resolution::Fallback(Arc::clone(&self.fallback))
        } else {
            Resolution::Unroutable
        }
    }
}
