//! Rate-controlled scheduler
//!
//! Launches one dispatch cycle per `1s / rate` until the run duration
//! elapses or a stop is requested, then drains in-flight cycles before
//! returning. The rate is re-read on every iteration.

use crate::actions::Action;
use crate::rate::RateHandle;
use crate::shutdown::{ShutdownCoordinator, ShutdownSignal};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use volley_config::LoadConfig;

/// How one dispatch cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(Action),
    Failed(Action),
    /// Nothing was legal
    Idle,
}

/// One unit of scheduled work
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn run_cycle(&self, cancel: CancellationToken) -> CycleOutcome;
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub run_duration: Duration,
    /// Fixed pool size; `None` spawns a task per cycle
    pub workers: Option<usize>,
    pub drain_timeout: Duration,
}

impl From<&LoadConfig> for SchedulerConfig {
    fn from(load: &LoadConfig) -> Self {
        Self {
            run_duration: load.run_duration,
            workers: load.workers,
            drain_timeout: load.drain_timeout,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Cycles handed to a task or worker
    pub launched: u64,
    pub completed: u64,
    pub failed: u64,
    pub idle: u64,
    /// Cycles skipped because the worker pool was saturated
    pub dropped: u64,
    pub drained_gracefully: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Default)]
struct Tally {
    completed: AtomicU64,
    failed: AtomicU64,
    idle: AtomicU64,
}

impl Tally {
    fn observe(&self, outcome: CycleOutcome) {
        let counter = match outcome {
            CycleOutcome::Completed(_) => &self.completed,
            CycleOutcome::Failed(_) => &self.failed,
            CycleOutcome::Idle => &self.idle,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// A queued cycle dequeued after the drain gave up
    fn abandon(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct Scheduler<R> {
    runner: Arc<R>,
    rate: RateHandle,
    config: SchedulerConfig,
}

impl<R: CycleRunner> Scheduler<R> {
    pub fn new(runner: Arc<R>, rate: RateHandle, config: SchedulerConfig) -> Self {
        Self {
            runner,
            rate,
            config,
        }
    }

    /// Launch cycles until the run ends or `stop` fires, then drain
    pub async fn run(&self, stop: CancellationToken) -> RunSummary {
        let started = Instant::now();
        let deadline = started + self.config.run_duration;
        let coordinator = ShutdownCoordinator::new(self.config.drain_timeout);
        let tally = Arc::new(Tally::default());
        let pool = self
            .config
            .workers
            .map(|workers| self.start_workers(workers, &coordinator, &tally));

        info!(
            rate = self.rate.get(),
            duration_secs = self.config.run_duration.as_secs_f64(),
            workers = ?self.config.workers,
            "Scheduler started"
        );

        let mut launched = 0u64;
        let mut dropped = 0u64;
        loop {
            if stop.is_cancelled() || Instant::now() >= deadline {
                break;
            }

            match &pool {
                Some(queue) => match queue.try_send(()) {
                    Ok(()) => launched += 1,
                    Err(mpsc::error::TrySendError::Full(())) => {
                        dropped += 1;
                        warn!("Worker pool saturated, dropping dispatch cycle");
                    }
                    Err(mpsc::error::TrySendError::Closed(())) => break,
                },
                None => {
                    let runner = self.runner.clone();
                    let tally = tally.clone();
                    let cancel = coordinator.token();
                    coordinator.spawn(async move {
                        tally.observe(runner.run_cycle(cancel).await);
                    });
                    launched += 1;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.rate.interval()) => {}
                _ = tokio::time::sleep_until(deadline) => break,
                _ = stop.cancelled() => {
                    info!("Stop requested, ending run early");
                    break;
                }
            }
        }

        // Closing the queue lets idle workers exit once it is empty
        drop(pool);
        info!(launched, dropped, "Run finished, draining");

        let drained_gracefully = match coordinator.shutdown().await {
            Ok(ShutdownSignal::Graceful) => true,
            Ok(ShutdownSignal::Forced) => false,
            Err(e) => {
                warn!(error = %e, "Drain incomplete");
                false
            }
        };

        RunSummary {
            launched,
            completed: tally.completed.load(Ordering::Relaxed),
            failed: tally.failed.load(Ordering::Relaxed),
            idle: tally.idle.load(Ordering::Relaxed),
            dropped,
            drained_gracefully,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn start_workers(
        &self,
        workers: usize,
        coordinator: &ShutdownCoordinator,
        tally: &Arc<Tally>,
    ) -> mpsc::Sender<()> {
        let (sender, receiver) = mpsc::channel::<()>(workers.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        for worker in 0..workers {
            let receiver = receiver.clone();
            let runner = self.runner.clone();
            let tally = tally.clone();
            let cancel = coordinator.token();
            coordinator.spawn(async move {
                // Runs until the scheduler closes the queue and it is empty
                while receiver.lock().await.recv().await.is_some() {
                    if cancel.is_cancelled() {
                        // Already counted as launched; it never gets to run
                        tally.abandon();
                        continue;
                    }
                    tally.observe(runner.run_cycle(cancel.clone()).await);
                }
                debug!(worker, "Worker exiting");
            });
        }
        sender
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU64;

    struct CountingRunner {
        calls: AtomicU64,
        work: Duration,
    }

    impl CountingRunner {
        fn new(work: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU64::new(0),
                work,
            })
        }
    }

    #[async_trait]
    impl CycleRunner for CountingRunner {
        async fn run_cycle(&self, cancel: CancellationToken) -> CycleOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::select! {
                _ = tokio::time::sleep(self.work) => CycleOutcome::Completed(Action::NewRegistration),
                _ = cancel.cancelled() => CycleOutcome::Failed(Action::NewRegistration),
            }
        }
    }

    fn scheduler(
        runner: Arc<CountingRunner>,
        rate: u64,
        run_duration: Duration,
        workers: Option<usize>,
    ) -> Scheduler<CountingRunner> {
        Scheduler::new(
            runner,
            RateHandle::new(NonZeroU64::new(rate).unwrap()),
            SchedulerConfig {
                run_duration,
                workers,
                drain_timeout: Duration::from_secs(2),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_launches_rate_times_duration() {
        let runner = CountingRunner::new(Duration::from_millis(50));
        let summary = scheduler(runner.clone(), 10, Duration::from_secs(3), None)
            .run(CancellationToken::new())
            .await;

        assert!((29..=31).contains(&summary.launched), "{summary:?}");
        assert_eq!(summary.completed, summary.launched);
        assert_eq!(runner.calls.load(Ordering::SeqCst), summary.launched);
        assert!(summary.drained_gracefully);
        assert_eq!(summary.dropped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_waits_for_in_flight_cycles() {
        let runner = CountingRunner::new(Duration::from_millis(1500));
        let summary = scheduler(runner, 4, Duration::from_secs(1), None)
            .run(CancellationToken::new())
            .await;

        // Every launched cycle finished, including those started near the end
        assert_eq!(summary.completed, summary.launched);
        assert_eq!(summary.failed, 0);
        assert!(summary.drained_gracefully);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycles_are_cancelled_after_drain_timeout() {
        let runner = CountingRunner::new(Duration::from_secs(3600));
        let summary = scheduler(runner, 5, Duration::from_secs(1), None)
            .run(CancellationToken::new())
            .await;

        assert!(summary.launched > 0);
        assert_eq!(summary.failed, summary.launched);
        assert!(!summary.drained_gracefully);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_run_early() {
        let runner = CountingRunner::new(Duration::from_millis(10));
        let stop = CancellationToken::new();
        let trigger = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let summary = scheduler(runner, 10, Duration::from_secs(60), None)
            .run(stop)
            .await;
        assert!(summary.launched <= 6, "{summary:?}");
        assert!(summary.elapsed_ms < 60_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_saturated_pool_drops_cycles() {
        let runner = CountingRunner::new(Duration::from_secs(10));
        let summary = scheduler(runner, 10, Duration::from_secs(1), Some(1))
            .run(CancellationToken::new())
            .await;

        assert!(summary.dropped > 0, "{summary:?}");
        assert_eq!(summary.launched + summary.dropped, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_tally_accounts_for_every_launched_cycle() {
        let runner = CountingRunner::new(Duration::from_secs(3600));
        let summary = scheduler(runner.clone(), 10, Duration::from_secs(1), Some(1))
            .run(CancellationToken::new())
            .await;

        // One cycle was running and one sat in the queue when the drain timed out
        assert_eq!(summary.launched, 2, "{summary:?}");
        assert_eq!(
            summary.completed + summary.failed + summary.idle,
            summary.launched
        );
        assert_eq!(summary.failed, 2);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
        assert!(!summary.drained_gracefully);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_pool_runs_every_accepted_cycle() {
        let runner = CountingRunner::new(Duration::from_millis(10));
        let summary = scheduler(runner.clone(), 20, Duration::from_secs(1), Some(4))
            .run(CancellationToken::new())
            .await;

        assert_eq!(summary.dropped, 0);
        assert_eq!(summary.completed, summary.launched);
        assert_eq!(runner.calls.load(Ordering::SeqCst), summary.launched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_change_takes_effect() {
        let runner = CountingRunner::new(Duration::from_millis(1));
        let rate = RateHandle::new(NonZeroU64::new(1).unwrap());
        let control = rate.clone();
        let scheduler = Scheduler::new(
            runner,
            rate,
            SchedulerConfig {
                run_duration: Duration::from_secs(4),
                workers: None,
                drain_timeout: Duration::from_secs(1),
            },
        );
        control.set(NonZeroU64::new(5).unwrap());

        let summary = scheduler.run(CancellationToken::new()).await;
        assert!((19..=21).contains(&summary.launched), "{summary:?}");
    }
}
