//! Line-oriented JSON input.
//!
//! Reads newline-delimited records, forwards those that decode as JSON and
//! reports the rest as input failures.

use bytes::Bytes;
use snafu::prelude::*;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use snowdrift_core::emit;
use snowdrift_core::metrics::events::{InputLineRead, InputLineStatus};

use crate::error::{AppError, StreamIoSnafu};
use crate::failure::{InputFailure, InputFailureCause};
use crate::submit::FailureSubmitter;

/// Lines seen by a [`LineInput`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputStats {
    pub forwarded: usize,
    pub failed: usize,
}

pub struct LineInput {
    input_id: String,
    submitter: FailureSubmitter,
}

impl LineInput {
    pub fn new(input_id: impl Into<String>, submitter: FailureSubmitter) -> Self {
        Self {
            input_id: input_id.into(),
            submitter,
        }
    }

    /// Consume `reader` until end of input or shutdown.
    ///
    /// Blank lines are ignored. Lines that are not valid UTF-8 or not valid
    /// JSON are reported with their raw bytes.
    pub async fn run<R, W>(
        &self,
        mut reader: R,
        mut writer: W,
        shutdown: CancellationToken,
    ) -> Result<InputStats, AppError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut stats = InputStats::default();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(input_id = %self.input_id, "Shutdown requested, closing input");
                    break;
                }

                read = reader.read_until(b'\n', &mut buf) => read.context(StreamIoSnafu)?,
            };

            if read == 0 {
                debug!(input_id = %self.input_id, "End of input");
                break;
            }
            let line = trim_line_end(&buf);
            if line.trim_ascii().is_empty() {
                continue;
            }

            match serde_json::from_slice::<serde_json::Value>(line) {
                Ok(_) => {
                    writer.write_all(line).await.context(StreamIoSnafu)?;
                    writer.write_all(b"\n").await.context(StreamIoSnafu)?;
                    stats.forwarded += 1;
                    emit!(InputLineRead {
                        status: InputLineStatus::Decoded,
                    });
                }
                Err(e) => {
                    let failure = InputFailure::new(
                        InputFailureCause::InputParse,
                        "Failed to decode input line as JSON",
                        e.to_string(),
                        Bytes::copy_from_slice(line),
                        self.input_id.as_str(),
                    );
                    self.submitter.submit_input_failure(failure).await;
                    stats.failed += 1;
                    emit!(InputLineRead {
                        status: InputLineStatus::Failed,
                    });
                }
            }
        }

        writer.flush().await.context(StreamIoSnafu)?;
        Ok(stats)
    }
}

/// Strip a trailing `\n` or `\r\n`.
fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FailureHandlingConfig;
    use crate::failure::FailureType;
    use crate::queue::{FailureSource, FailureSubmissionQueue};
    use std::num::NonZeroUsize;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_forwards_json_and_reports_garbage() {
        let queue = Arc::new(FailureSubmissionQueue::new(NonZeroUsize::new(8).unwrap()));
        let submitter = FailureSubmitter::new(queue.clone(), &FailureHandlingConfig::default());
        let input = LineInput::new("test-input", submitter);

        let data: &[u8] = b"{\"message\":\"ok\"}\n\nnot json\n[1,2]\n";
        let mut output = Vec::new();
        let stats = input
            .run(data, &mut output, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats, InputStats { forwarded: 2, failed: 1 });
        assert_eq!(String::from_utf8(output).unwrap(), "{\"message\":\"ok\"}\n[1,2]\n");

        let batch = queue.consume().await.unwrap();
        assert_eq!(batch.failure_type(), FailureType::Input);
        let failure = &batch.input_failures().unwrap()[0];
        assert_eq!(failure.cause, InputFailureCause::InputParse);
        assert_eq!(failure.input_id, "test-input");
        assert_eq!(failure.raw_message, Bytes::from_static(b"not json"));
        assert_eq!(queue.queue_size(), 0);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_reported_raw() {
        let queue = Arc::new(FailureSubmissionQueue::new(NonZeroUsize::new(8).unwrap()));
        let submitter = FailureSubmitter::new(queue.clone(), &FailureHandlingConfig::default());
        let input = LineInput::new("stdin", submitter);

        let data: &[u8] = b"{\"a\":1}\n\xff\xfe garbage\r\n{\"b\":2}";
        let mut output = Vec::new();
        let stats = input
            .run(data, &mut output, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats, InputStats { forwarded: 2, failed: 1 });
        assert_eq!(output, b"{\"a\":1}\n{\"b\":2}\n");

        let batch = queue.consume().await.unwrap();
        let failure = &batch.input_failures().unwrap()[0];
        assert_eq!(failure.cause, InputFailureCause::InputParse);
        assert_eq!(failure.raw_message, Bytes::from_static(b"\xff\xfe garbage"));
        assert_eq!(queue.queue_size(), 0);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let queue = Arc::new(FailureSubmissionQueue::new(NonZeroUsize::new(1).unwrap()));
        let submitter = FailureSubmitter::new(queue, &FailureHandlingConfig::default());
        let input = LineInput::new("stdin", submitter);

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let (_client, server) = tokio::io::duplex(64);
        let stats = input
            .run(tokio::io::BufReader::new(server), tokio::io::sink(), shutdown)
            .await
            .unwrap();
        assert_eq!(stats, InputStats::default());
    }
}
