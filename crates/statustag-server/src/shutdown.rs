//! Graceful shutdown coordination via `CancellationToken`.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// Default time device sessions get to close before the process exits anyway.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Cancels every device session and waits for their cleanup.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            sessions: TaskTracker::new(),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wrap a session future so shutdown can wait for it.
    pub fn track<F: Future>(&self, session: F) -> TrackedFuture<F> {
        self.sessions.track_future(session)
    }

    /// Sessions still running.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel all sessions and wait up to `timeout` for them to finish cleanup.
    pub async fn graceful_shutdown(&self, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        self.shutdown();
        let _ = self.sessions.close();
        info!(
            sessions = self.sessions.len(),
            timeout_ms = timeout.as_millis() as u64,
            "waiting for device sessions to close"
        );

        if tokio::time::timeout(timeout, self.sessions.wait()).await.is_err() {
            warn!(
                remaining = self.sessions.len(),
                "shutdown timed out after {timeout:?}, abandoning open sessions"
            );
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_not_shutting_down() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
        assert_eq!(coord.active_sessions(), 0);
    }

    #[test]
    fn token_propagation() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        assert!(!token.is_cancelled());
        coord.shutdown();
        assert!(token.is_cancelled());
    }

    #[test]
    fn child_tokens_are_cancelled() {
        let coord = ShutdownCoordinator::new();
        let child = coord.token().child_token();
        coord.shutdown();
        coord.shutdown();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn graceful_shutdown_awaits_tracked_sessions() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();

        let session = coord.track(async move {
            token.cancelled().await;
            let _ = done_tx.send(());
        });
        let _handle = tokio::spawn(session);
        assert_eq!(coord.active_sessions(), 1);

        coord.graceful_shutdown(None).await;
        assert!(coord.is_shutting_down());
        assert_eq!(coord.active_sessions(), 0);
        assert!(done_rx.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_shutdown_times_out() {
        let coord = ShutdownCoordinator::new();

        // Ignores cancellation
        let session = coord.track(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        });
        let _handle = tokio::spawn(session);

        coord.graceful_shutdown(Some(Duration::from_millis(100))).await;
        assert!(coord.is_shutting_down());
        assert_eq!(coord.active_sessions(), 1);
    }
}
