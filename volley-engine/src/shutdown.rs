//! Drain coordination for in-flight dispatch cycles
//!
//! Shutdown escalates in two phases: first the tracker is closed and
//! in-flight cycles get `drain_timeout` to finish on their own, then the
//! cancellation token fires and they get `cancel_timeout` to unwind.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// How a shutdown ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Every cycle finished within the drain window
    Graceful,
    /// Cycles had to be cancelled
    Forced,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Graceful => write!(f, "graceful"),
            ShutdownSignal::Forced => write!(f, "forced"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShutdownError {
    #[error("Shutdown already in progress")]
    AlreadyShuttingDown,

    #[error("{0} tasks still running after cancellation")]
    TasksRemaining(usize),
}

pub struct ShutdownCoordinator {
    token: CancellationToken,
    tracker: TaskTracker,
    shutting_down: AtomicBool,
    drain_timeout: Duration,
    cancel_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(drain_timeout: Duration) -> Self {
        Self::with_timeouts(drain_timeout, Duration::from_secs(5))
    }

    pub fn with_timeouts(drain_timeout: Duration, cancel_timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            shutting_down: AtomicBool::new(false),
            drain_timeout,
            cancel_timeout,
        }
    }

    /// Token every tracked task should watch at its await points
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawn a task the drain will wait for
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(task)
    }

    pub fn active_task_count(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Stop accepting work and wait for tracked tasks, escalating to cancellation
    pub async fn shutdown(&self) -> Result<ShutdownSignal, ShutdownError> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return Err(ShutdownError::AlreadyShuttingDown);
        }

        self.tracker.close();
        info!(
            in_flight = self.tracker.len(),
            "Draining in-flight dispatch cycles"
        );

        if tokio::time::timeout(self.drain_timeout, self.tracker.wait())
            .await
            .is_ok()
        {
            info!("Drain completed");
            return Ok(ShutdownSignal::Graceful);
        }

        warn!(
            in_flight = self.tracker.len(),
            "Drain timeout, cancelling in-flight cycles"
        );
        self.token.cancel();

        if tokio::time::timeout(self.cancel_timeout, self.tracker.wait())
            .await
            .is_ok()
        {
            return Ok(ShutdownSignal::Forced);
        }

        let remaining = self.tracker.len();
        error!(remaining, "Cycles still running after cancellation");
        Err(ShutdownError::TasksRemaining(remaining))
    }
}
