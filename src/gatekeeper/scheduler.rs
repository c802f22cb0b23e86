//! Recurring sweep timer.
//!
//! A single background task calls `Sweeper::sweep()` every `period`. The
//! first sweep fires one full period after `start()`. A sweep that is
//! already running when `stop()` is called completes first.

use super::engine::Sweeper;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

/// Smallest accepted sweep period.
const MIN_PERIOD: Duration = Duration::from_secs(1);

pub struct SweepScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweepScheduler {
    /// Spawn the sweep task. Must be called from within a tokio runtime.
    pub fn start(sweeper: Arc<dyn Sweeper>, period: Duration) -> Self {
        let period = period.max(MIN_PERIOD);
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            // A slow sweep pushes the schedule back instead of bunching sweeps
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period = ?period, "sweep scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match sweeper.sweep().await {
                            Ok(report) => info!(
                                checked = report.checked,
                                revoked = report.revoked.len(),
                                errors = report.errors.len(),
                                "scheduled sweep complete"
                            ),
                            Err(e) => error!(error = %e, "scheduled sweep failed"),
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }

            info!("sweep scheduler stopped");
        });

        Self { shutdown, handle }
    }

    /// Stop the timer and wait for the task to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "sweep task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatekeeper::engine::{ComplianceError, SweepReport};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSweeper {
        sweeps: AtomicUsize,
    }

    #[async_trait]
    impl Sweeper for CountingSweeper {
        async fn sweep(&self) -> Result<SweepReport, ComplianceError> {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            Ok(SweepReport::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_at_fixed_interval() {
        let sweeper = Arc::new(CountingSweeper::default());
        let scheduler = SweepScheduler::start(sweeper.clone(), Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sweeper.sweeps.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(sweeper.sweeps.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
        assert_eq!(sweeper.sweeps.load(Ordering::SeqCst), 3);

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_sweeps() {
        let sweeper = Arc::new(CountingSweeper::default());
        let scheduler = SweepScheduler::start(sweeper.clone(), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(61)).await;
        scheduler.stop().await;
        let after_stop = sweeper.sweeps.load(Ordering::SeqCst);
        assert_eq!(after_stop, 1);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(sweeper.sweeps.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_sweep_keeps_schedule() {
        struct FailingSweeper(AtomicUsize);

        #[async_trait]
        impl Sweeper for FailingSweeper {
            async fn sweep(&self) -> Result<SweepReport, ComplianceError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(ComplianceError::UpstreamUnavailable("store offline".to_string()))
            }
        }

        let sweeper = Arc::new(FailingSweeper(AtomicUsize::new(0)));
        let scheduler = SweepScheduler::start(sweeper.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(sweeper.0.load(Ordering::SeqCst), 3);

        scheduler.stop().await;
    }
}
