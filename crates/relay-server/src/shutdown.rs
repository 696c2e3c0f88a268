//! Shutdown coordination.
//!
//! Lifecycle: `Serving → Draining → Stopped`. Draining stops the listener
//! from accepting new work (axum's graceful shutdown waits on the draining
//! token) while in-flight chat drivers, tracked on a [`TaskTracker`], run to
//! completion. If they do not finish within the grace period the force token
//! fires; every per-request cancellation token is a child of it, so the
//! remaining streams stop emitting and the outcome is reported as forced.

use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Where the coordinator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Accepting and serving requests.
    Serving,
    /// Listener closed, in-flight work draining.
    Draining,
    /// Drain finished, one way or the other.
    Stopped,
}

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// All in-flight work finished within the grace period.
    Clean,
    /// The grace period elapsed; remaining work was cut off. The process
    /// should exit non-zero.
    Forced,
}

/// Coordinates graceful shutdown of the chat subsystem.
pub struct ShutdownCoordinator {
    state: Mutex<ShutdownState>,
    draining: CancellationToken,
    force: CancellationToken,
    tracker: TaskTracker,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    /// Creates a coordinator in the `Serving` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ShutdownState::Serving),
            draining: CancellationToken::new(),
            force: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ShutdownState {
        *self.state.lock()
    }

    /// Token that fires when draining begins. The listener's graceful
    /// shutdown waits on this.
    #[must_use]
    pub fn draining_token(&self) -> CancellationToken {
        self.draining.clone()
    }

    /// Cancellation token for one request. Child of the force token: firing
    /// only when the grace period is exhausted, so draining alone lets
    /// in-flight streams finish.
    #[must_use]
    pub fn request_token(&self) -> CancellationToken {
        self.force.child_token()
    }

    /// Tracker for in-flight chat drivers.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Enters `Draining`: the listener stops accepting and the tracker is
    /// closed so it can report empty. Idempotent.
    pub fn begin_drain(&self) {
        let mut state = self.state.lock();
        if *state != ShutdownState::Serving {
            return;
        }
        *state = ShutdownState::Draining;
        drop(state);
        info!("shutdown: draining");
        self.draining.cancel();
        let _ = self.tracker.close();
    }

    /// Drains in-flight work, waiting at most `grace`.
    pub async fn drain(&self, grace: Duration) -> ShutdownOutcome {
        self.begin_drain();
        let outcome = tokio::select! {
            () = self.tracker.wait() => ShutdownOutcome::Clean,
            () = tokio::time::sleep(grace) => {
                warn!(grace_secs = grace.as_secs(), "grace period elapsed, forcing shutdown");
                self.force.cancel();
                ShutdownOutcome::Forced
            }
        };
        *self.state.lock() = ShutdownState::Stopped;
        info!(?outcome, "shutdown: stopped");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn clean_when_work_finishes_within_grace() {
        let coord = ShutdownCoordinator::new();
        let _ = coord.tracker().spawn(async {
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let start = Instant::now();
        let outcome = coord.drain(Duration::from_secs(10)).await;

        assert_eq!(outcome, ShutdownOutcome::Clean);
        assert!(start.elapsed() < Duration::from_secs(3));
        assert_eq!(coord.state(), ShutdownState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn forced_at_grace_deadline() {
        let coord = ShutdownCoordinator::new();
        let token = coord.request_token();
        let _ = coord.tracker().spawn(async move {
            // Runs until forced.
            token.cancelled().await;
        });

        let start = Instant::now();
        let outcome = coord.drain(Duration::from_secs(10)).await;

        assert_eq!(outcome, ShutdownOutcome::Forced);
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_clean_with_no_work() {
        let coord = ShutdownCoordinator::new();
        let outcome = coord.drain(Duration::from_secs(10)).await;
        assert_eq!(outcome, ShutdownOutcome::Clean);
    }

    #[tokio::test(start_paused = true)]
    async fn request_tokens_survive_draining() {
        let coord = ShutdownCoordinator::new();
        let token = coord.request_token();
        coord.begin_drain();
        assert!(!token.is_cancelled());
        assert_eq!(coord.state(), ShutdownState::Draining);
        assert!(coord.draining_token().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn begin_drain_is_idempotent() {
        let coord = ShutdownCoordinator::new();
        coord.begin_drain();
        coord.begin_drain();
        assert_eq!(coord.state(), ShutdownState::Draining);
    }
}
