//! Graceful shutdown coordination via `CancellationToken`.
//!
//! Cancelling the token stops the listener and tells every session to end
//! with a shutdown outcome. [`ShutdownCoordinator::graceful_shutdown`] then
//! waits for the listener task and for the registry to drain.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::registry::SessionRegistry;

/// Default timeout for graceful shutdown before giving up on sessions.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Coordinates graceful shutdown across the listener and every session.
///
/// Sessions watch the token and end with a shutdown outcome; the listener
/// stops accepting once it is cancelled.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

/// What was still running when a graceful shutdown returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrainReport {
    /// The listener task did not finish in time and was aborted.
    pub listener_aborted: bool,
    /// Sessions still registered at the deadline.
    pub sessions_remaining: usize,
}

impl DrainReport {
    /// Everything stopped before the deadline.
    pub fn is_clean(&self) -> bool {
        !self.listener_aborted && self.sessions_remaining == 0
    }
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token, then drain within a single `timeout` budget.
    ///
    /// 1. Wait for the `listener` task; abort it at the deadline.
    /// 2. Wait for every session to leave `registry`.
    pub async fn graceful_shutdown(
        &self,
        listener: JoinHandle<()>,
        registry: &SessionRegistry,
        timeout: Duration,
    ) -> DrainReport {
        let deadline = Instant::now() + timeout;
        self.shutdown();
        info!(
            sessions = registry.len(),
            timeout_ms = timeout.as_millis(),
            "draining"
        );

        let abort = listener.abort_handle();
        let listener_aborted = tokio::time::timeout_at(deadline, listener).await.is_err();
        if listener_aborted {
            abort.abort();
            warn!("listener did not stop within {timeout:?}; aborted");
        }

        // sessions run on their own tasks and deregister as they close
        while !registry.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }

        let report = DrainReport {
            listener_aborted,
            sessions_remaining: registry.len(),
        };
        if report.sessions_remaining > 0 {
            warn!(
                remaining = report.sessions_remaining,
                "sessions still open after {timeout:?}"
            );
        }
        report
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
