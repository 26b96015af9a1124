//! Dead-letter handler.
//!
//! Writes every handled batch as one NDJSON object to a configurable storage
//! location (local directory or object store) for later inspection and
//! reprocessing. Objects are laid out as
//! `<failure_type>/<timestamp>-<pid>-<batch_id>.ndjson`, one line per
//! failure. Batch ids restart with every process, so the timestamp carries
//! microseconds and the process id is part of the name.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use object_store::PutPayload;
use object_store::path::Path;
use serde::Serialize;
use snafu::prelude::*;
use tokio::sync::Mutex;
use tracing::{debug, info};

use snowdrift_core::emit;
use snowdrift_core::metrics::events::DeadLetterRecordsWritten;
use snowdrift_core::{StorageProvider, StorageProviderRef};

use crate::config::DeadLetterConfig;
use crate::error::{
    DeadLetterSerializeSnafu, DeadLetterStorageSnafu, DeadLetterWriteSnafu, DlqError, HandlerError,
};
use crate::failure::{Failure, FailureBatch, FailureType};

use super::FailureHandler;

/// One line of a dead-letter object.
#[derive(Debug, Serialize)]
struct DeadLetterRecord<'a> {
    batch_id: u64,
    failure_type: FailureType,
    cause: &'static str,
    message: &'a str,
    details: &'a str,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_index: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    acknowledged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_id: Option<&'a str>,
    /// Base64-encoded raw payload of an input failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_message: Option<String>,
}

impl<'a> DeadLetterRecord<'a> {
    fn common(batch_id: u64, failure: &'a dyn Failure) -> Self {
        Self {
            batch_id,
            failure_type: failure.failure_type(),
            cause: failure.cause(),
            message: failure.message(),
            details: failure.details(),
            timestamp: failure.timestamp(),
            target_index: None,
            message_id: None,
            acknowledged: None,
            input_id: None,
            raw_message: None,
        }
    }

    fn from_batch(batch: &'a FailureBatch) -> Vec<Self> {
        let id = batch.id();
        if let Some(failures) = batch.indexing_failures() {
            failures
                .iter()
                .map(|f| Self {
                    target_index: Some(&f.target_index),
                    message_id: f.message_id.as_deref(),
                    ..Self::common(id, f)
                })
                .collect()
        } else if let Some(failures) = batch.processing_failures() {
            failures
                .iter()
                .map(|f| Self {
                    message_id: f.failed_message.message_queue_id(),
                    acknowledged: Some(f.acknowledge),
                    ..Self::common(id, f)
                })
                .collect()
        } else if let Some(failures) = batch.input_failures() {
            failures
                .iter()
                .map(|f| Self {
                    input_id: Some(&f.input_id),
                    raw_message: Some(STANDARD.encode(&f.raw_message)),
                    ..Self::common(id, f)
                })
                .collect()
        } else {
            Vec::new()
        }
    }
}

/// Number of failures written, per failure type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeadLetterStats {
    pub indexing: usize,
    pub processing: usize,
    pub input: usize,
}

impl DeadLetterStats {
    fn add(&mut self, failure_type: FailureType, count: usize) {
        match failure_type {
            FailureType::Indexing => self.indexing += count,
            FailureType::Processing => self.processing += count,
            FailureType::Input => self.input += count,
        }
    }

    pub fn total(&self) -> usize {
        self.indexing + self.processing + self.input
    }
}

/// Handler persisting failure batches to storage.
pub struct DeadLetterHandler {
    storage: StorageProviderRef,
    failure_types: Vec<FailureType>,
    stats: Mutex<DeadLetterStats>,
}

impl DeadLetterHandler {
    /// Write batches of the given types (all types when empty) to `storage`.
    pub fn new(storage: StorageProviderRef, failure_types: Vec<FailureType>) -> Self {
        Self {
            storage,
            failure_types,
            stats: Mutex::new(DeadLetterStats::default()),
        }
    }

    pub async fn from_config(config: &DeadLetterConfig) -> Result<Self, DlqError> {
        let storage =
            StorageProvider::for_url_with_options(&config.path, config.storage_options.clone())
                .await
                .context(DeadLetterStorageSnafu {
                    url: config.path.clone(),
                })?;

        info!(
            "Dead-letter handler enabled: {} ({:?})",
            storage.canonical_url(),
            config.role
        );
        Ok(Self::new(storage.into(), config.failure_types.clone()))
    }

    pub async fn stats(&self) -> DeadLetterStats {
        *self.stats.lock().await
    }

    /// Log the totals written so far.
    pub async fn finalize(&self) {
        let stats = self.stats().await;
        info!(
            "Dead-letter handler finalized: {} total failures (indexing={}, processing={}, input={})",
            stats.total(),
            stats.indexing,
            stats.processing,
            stats.input
        );
    }

    fn object_path(batch: &FailureBatch, now: DateTime<Utc>) -> Path {
        Path::from(format!(
            "{}/{}-{}-{:08}.ndjson",
            batch.failure_type(),
            now.format("%Y%m%d-%H%M%S%.6f"),
            std::process::id(),
            batch.id()
        ))
    }

    async fn write(&self, batch: &FailureBatch) -> Result<(), DlqError> {
        let records = DeadLetterRecord::from_batch(batch);
        let count = records.len();

        let mut ndjson = String::new();
        for record in &records {
            let line = serde_json::to_string(record).context(DeadLetterSerializeSnafu)?;
            ndjson.push_str(&line);
            ndjson.push('\n');
        }
        let bytes = ndjson.len();

        let path = Self::object_path(batch, Utc::now());
        self.storage
            .put_payload(&path, PutPayload::from(Bytes::from(ndjson)))
            .await
            .context(DeadLetterWriteSnafu {
                path: path.to_string(),
            })?;

        debug!(batch_id = batch.id(), %path, count, "Wrote dead-letter records");
        emit!(DeadLetterRecordsWritten {
            records: count,
            bytes,
        });
        self.stats.lock().await.add(batch.failure_type(), count);
        Ok(())
    }
}

#[async_trait]
impl FailureHandler for DeadLetterHandler {
    fn name(&self) -> &str {
        "dead_letter"
    }

    fn supports(&self, batch: &FailureBatch) -> bool {
        self.failure_types.is_empty() || self.failure_types.contains(&batch.failure_type())
    }

    async fn handle(&self, batch: &FailureBatch) -> Result<(), HandlerError> {
        self.write(batch).await?;
        Ok(())
    }
}
