//! The failure-handling service.
//!
//! A single background task consumes failure batches from a
//! [`FailureSource`], dispatches them to the configured handlers and
//! acknowledges eligible messages. On stop it switches to a bounded drain:
//! it keeps polling with the configured timeout and terminates the first
//! time a poll comes back empty.

mod dispatch;
mod state;

pub use dispatch::DispatchStats;
pub use state::ServiceState;

use snafu::prelude::*;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use snowdrift_core::emit;
use snowdrift_core::metrics::events::FailureQueueDrained;

use crate::ack::MessageQueueAcknowledger;
use crate::config::FailureHandlingConfig;
use crate::error::{InvalidStateSnafu, NotRunningSnafu, ServiceError, TaskJoinSnafu};
use crate::handler::FailureHandlers;
use crate::queue::FailureSource;

use dispatch::Dispatcher;

type StateSender = Arc<watch::Sender<ServiceState>>;

/// Managed background consumer of the failure queue.
pub struct FailureHandlingService {
    dispatcher: Arc<Dispatcher>,
    source: Arc<dyn FailureSource>,
    shutdown_await: Duration,
    state: StateSender,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<DispatchStats>,
}

impl FailureHandlingService {
    pub fn new(
        handlers: FailureHandlers,
        source: Arc<dyn FailureSource>,
        config: &FailureHandlingConfig,
        acknowledger: Arc<dyn MessageQueueAcknowledger>,
    ) -> Self {
        let stats = Arc::new(DispatchStats::default());
        let (state, _) = watch::channel(ServiceState::New);
        Self {
            dispatcher: Arc::new(Dispatcher::new(handlers, acknowledger, stats.clone())),
            source,
            shutdown_await: config.shutdown_await(),
            state: Arc::new(state),
            shutdown: CancellationToken::new(),
            task: Mutex::new(None),
            stats,
        }
    }

    pub fn state(&self) -> ServiceState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Spawn the consumer task. Must be called from within a tokio runtime,
    /// at most once.
    pub fn start(&self) -> Result<(), ServiceError> {
        let mut current = ServiceState::New;
        let started = self.state.send_if_modified(|state| {
            current = *state;
            if *state == ServiceState::New {
                *state = ServiceState::Starting;
                true
            } else {
                false
            }
        });
        ensure!(
            started,
            InvalidStateSnafu {
                operation: "start",
                state: current,
            }
        );

        let task = tokio::spawn(run_consumer(
            self.dispatcher.clone(),
            self.source.clone(),
            self.shutdown.clone(),
            self.shutdown_await,
            self.state.clone(),
        ));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        Ok(())
    }

    /// Wait until the consumer loop is running.
    ///
    /// Fails if the service is stopped before it got there.
    pub async fn await_running(&self) -> Result<(), ServiceError> {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(|state| *state >= ServiceState::Running).await {
            Ok(state) => *state,
            Err(_) => ServiceState::Terminated,
        };
        ensure!(state == ServiceState::Running, NotRunningSnafu { state });
        Ok(())
    }

    /// Request shutdown.
    ///
    /// A running service drains the queue before terminating; a service that
    /// was never started terminates immediately. Repeated calls are no-ops.
    pub fn stop(&self) {
        let mut previous = ServiceState::New;
        self.state.send_if_modified(|state| {
            previous = *state;
            match *state {
                ServiceState::New => {
                    *state = ServiceState::Terminated;
                    true
                }
                ServiceState::Starting | ServiceState::Running => {
                    *state = ServiceState::Stopping;
                    true
                }
                ServiceState::Stopping | ServiceState::Terminated => false,
            }
        });

        match previous {
            ServiceState::Starting | ServiceState::Running => {
                info!("Stopping failure handling service");
                self.shutdown.cancel();
            }
            ServiceState::New => debug!("Failure handling service stopped before start"),
            ServiceState::Stopping | ServiceState::Terminated => {}
        }
    }

    /// Wait until the service has terminated.
    ///
    /// Surfaces a crash of the consumer task; the service is terminated
    /// either way.
    pub async fn await_terminated(&self) -> Result<(), ServiceError> {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.await.context(TaskJoinSnafu)?;
        }

        let mut rx = self.state.subscribe();
        let _ = rx
            .wait_for(|state| *state == ServiceState::Terminated)
            .await;
        Ok(())
    }
}

/// Marks the service terminated when the consumer task ends, including by
/// panic.
struct TerminateOnExit(StateSender);

impl Drop for TerminateOnExit {
    fn drop(&mut self) {
        self.0.send_replace(ServiceState::Terminated);
    }
}

async fn run_consumer(
    dispatcher: Arc<Dispatcher>,
    source: Arc<dyn FailureSource>,
    shutdown: CancellationToken,
    shutdown_await: Duration,
    state: StateSender,
) {
    let _terminate = TerminateOnExit(state.clone());

    state.send_if_modified(|state| {
        if *state == ServiceState::Starting {
            *state = ServiceState::Running;
            true
        } else {
            false
        }
    });
    info!("Failure handling service running");

    loop {
        let batch = tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            batch = source.consume() => batch,
        };

        match batch {
            Some(batch) => dispatcher.dispatch(batch).await,
            None => {
                info!("Failure source closed");
                break;
            }
        }
    }

    state.send_if_modified(|state| {
        if *state < ServiceState::Stopping {
            *state = ServiceState::Stopping;
            true
        } else {
            false
        }
    });

    let start = Instant::now();
    let mut drained = 0;
    while let Some(batch) = source.consume_with_timeout(shutdown_await).await {
        dispatcher.dispatch(batch).await;
        drained += 1;
    }

    emit!(FailureQueueDrained {
        batches: drained,
        duration: start.elapsed(),
    });
    info!(
        drained,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Failure handling service terminated"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::NoopAcknowledger;
    use crate::handler::LogFailureHandler;
    use crate::queue::FailureSubmissionQueue;
    use std::num::NonZeroUsize;

    fn service() -> FailureHandlingService {
        let queue = FailureSubmissionQueue::new(NonZeroUsize::new(4).unwrap());
        let config = FailureHandlingConfig {
            shutdown_await_ms: 10,
            ..Default::default()
        };
        FailureHandlingService::new(
            FailureHandlers::new(LogFailureHandler::new()),
            Arc::new(queue),
            &config,
            Arc::new(NoopAcknowledger),
        )
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let service = service();
        assert_eq!(service.state(), ServiceState::New);

        service.start().unwrap();
        service.await_running().await.unwrap();
        assert_eq!(service.state(), ServiceState::Running);

        service.stop();
        assert!(service.state().is_shutting_down());
        service.await_terminated().await.unwrap();
        assert_eq!(service.state(), ServiceState::Terminated);

        service.stop();
        assert_eq!(service.state(), ServiceState::Terminated);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let service = service();
        service.start().unwrap();
        let err = service.start().unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState { .. }));

        service.stop();
        service.await_terminated().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_before_start_terminates() {
        let service = service();
        service.stop();
        assert_eq!(service.state(), ServiceState::Terminated);
        service.await_terminated().await.unwrap();

        assert!(matches!(
            service.start(),
            Err(ServiceError::InvalidState {
                state: ServiceState::Terminated,
                ..
            })
        ));
        assert!(matches!(
            service.await_running().await,
            Err(ServiceError::NotRunning {
                state: ServiceState::Terminated
            })
        ));
    }
}
