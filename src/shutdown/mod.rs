// Graceful shutdown: signal handling plus a wait-group over live tasks.

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
#[error("graceful shutdown timeout exceeded")]
pub struct TimeoutError;

/// Graceful shutdown handler.
#[derive(Clone)]
pub struct GracefulShutdown {
    shutdown_token: CancellationToken,
    timeout: Duration,
    counter: Arc<Counter>,
}

#[derive(Default)]
struct Counter {
    active: AtomicUsize,
    idle: Notify,
}

/// Marks one task as running until dropped.
pub struct Guard {
    counter: Arc<Counter>,
}

impl Drop for Guard {
    fn drop(&mut self) {
        if self.counter.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.counter.idle.notify_waiters();
        }
    }
}

impl GracefulShutdown {
    pub fn new(shutdown_token: CancellationToken, timeout: Duration) -> Self {
        Self {
            shutdown_token,
            timeout,
            counter: Arc::new(Counter::default()),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Registers a task; shutdown waits until the returned guard is dropped.
    pub fn guard(&self) -> Guard {
        self.counter.active.fetch_add(1, Ordering::AcqRel);
        Guard {
            counter: self.counter.clone(),
        }
    }

    /// Number of registered tasks still running.
    pub fn active(&self) -> usize {
        self.counter.active.load(Ordering::Acquire)
    }

    /// Waits for SIGINT, SIGTERM or cancellation, then for all guarded
    /// tasks to finish.
    pub async fn await_shutdown(&self) -> Result<()> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigint.recv() => {
                info!(
                    component = "graceful-shutdown",
                    event = "os_signal",
                    signal = "SIGINT",
                    "cancellation started"
                );
            }
            _ = sigterm.recv() => {
                info!(
                    component = "graceful-shutdown",
                    event = "os_signal",
                    signal = "SIGTERM",
                    "cancellation started"
                );
            }
            _ = self.shutdown_token.cancelled() => {
                info!(
                    component = "graceful-shutdown",
                    event = "ctx_done",
                    "cancellation started"
                );
            }
        }

        self.cancel_and_await_with_timeout().await
    }

    /// Cancels the token and waits for guarded tasks, bounded by the timeout.
    pub async fn cancel_and_await_with_timeout(&self) -> Result<()> {
        self.shutdown_token.cancel();

        match timeout(self.timeout, self.wait_for_completion()).await {
            Ok(()) => {
                info!(
                    component = "graceful-shutdown",
                    event = "shutdown_success",
                    "service was gracefully shut down"
                );
                Ok(())
            }
            Err(_) => {
                warn!(
                    component = "graceful-shutdown",
                    event = "shutdown_timeout",
                    timeout_ms = self.timeout.as_millis() as u64,
                    active = self.active(),
                    "not all tasks were closed within timeout"
                );
                Err(TimeoutError.into())
            }
        }
    }

    async fn wait_for_completion(&self) {
        loop {
            // Register interest before checking so a wakeup is not missed.
            let idle = self.counter.idle.notified();
            if self.active() == 0 {
                return;
            }
            idle.await;
        }
    }
}
