//! Wiring of the `snowdrift` binary.

use snafu::prelude::*;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::info;

use snowdrift_core::{CliArgs, init_metrics, shutdown_signal};

use crate::ack::NoopAcknowledger;
use crate::config::{Config, HandlerRole};
use crate::error::{AddressParseSnafu, AppError};
use crate::handler::{DeadLetterHandler, FailureHandlers, LogFailureHandler};
use crate::input::LineInput;
use crate::queue::FailureSubmissionQueue;
use crate::service::FailureHandlingService;
use crate::submit::FailureSubmitter;

/// Build the handler set described by the configuration.
///
/// Returns the dead-letter handler separately so its totals can be reported
/// at exit.
pub async fn build_handlers(
    config: &Config,
) -> Result<(FailureHandlers, Option<Arc<DeadLetterHandler>>), AppError> {
    let Some(dead_letter_config) = &config.dead_letter else {
        return Ok((FailureHandlers::new(LogFailureHandler::new()), None));
    };

    let dead_letter = Arc::new(DeadLetterHandler::from_config(dead_letter_config).await?);
    let handlers = match dead_letter_config.role {
        HandlerRole::Fallback => FailureHandlers::from_fallback(dead_letter.clone()),
        HandlerRole::Custom => {
            FailureHandlers::new(LogFailureHandler::new()).with_custom(dead_letter.clone())
        }
    };
    Ok((handlers, Some(dead_letter)))
}

/// Run the service against stdin until end of input or a shutdown signal.
pub async fn run(args: CliArgs) -> Result<(), AppError> {
    let config = Config::from_file(&args.config)?;

    if config.metrics.enabled {
        let addr: SocketAddr = config.metrics.address.parse().context(AddressParseSnafu)?;
        init_metrics(addr)?;
    }

    let queue = Arc::new(FailureSubmissionQueue::new(
        config.failure_handling.queue_capacity()?,
    ));
    let (handlers, dead_letter) = build_handlers(&config).await?;
    info!(
        capacity = queue.capacity(),
        custom_handlers = handlers.custom().len(),
        fallback = handlers.fallback().name(),
        "Starting snowdrift"
    );

    let service = FailureHandlingService::new(
        handlers,
        queue.clone(),
        &config.failure_handling,
        Arc::new(NoopAcknowledger),
    );
    service.start()?;
    service.await_running().await?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let input = LineInput::new(
        args.input_id,
        FailureSubmitter::new(queue, &config.failure_handling),
    );
    let result = input
        .run(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            shutdown,
        )
        .await;

    service.stop();
    service.await_terminated().await?;
    if let Some(dead_letter) = dead_letter {
        dead_letter.finalize().await;
    }

    let input_stats = result?;
    let stats = service.stats();
    info!(
        forwarded = input_stats.forwarded,
        failed = input_stats.failed,
        dispatched = stats.processed(),
        dropped = stats.dropped(),
        handler_errors = stats.handler_errors(),
        "snowdrift finished"
    );
    Ok(())
}
