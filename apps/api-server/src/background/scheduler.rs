//! Sweep scheduler - runs the due-post sweeper on a fixed interval.
//!
//! One loop per [`Scheduler`] value. The composition root owns the value,
//! calls [`Scheduler::start`] after building state and [`Scheduler::stop`]
//! once the HTTP server has drained.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use cadence_core::services::{DueSweeper, SweepError, SweepReport};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Enable the periodic loop. Manual triggers work either way.
    pub enabled: bool,
    /// Wait between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Minimum gap between two "no posts due" log lines.
    pub idle_log_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(30),
            idle_log_interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyRunning,
}

struct RunningLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the periodic sweep loop.
pub struct Scheduler {
    sweeper: Arc<DueSweeper>,
    config: SchedulerConfig,
    running: Mutex<Option<RunningLoop>>,
}

impl Scheduler {
    pub fn new(sweeper: Arc<DueSweeper>, config: SchedulerConfig) -> Self {
        Self {
            sweeper,
            config,
            running: Mutex::new(None),
        }
    }

    /// Spawn the sweep loop.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if !self.config.enabled {
            tracing::info!("Scheduler disabled");
            return Ok(());
        }

        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            self.sweeper.clone(),
            self.config.clone(),
            cancel.clone(),
        ));
        *running = Some(RunningLoop { cancel, task });

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.sweeper.config().batch_size,
            "Scheduler started"
        );
        Ok(())
    }

    /// Stop the loop and wait for an in-flight cycle to finish.
    pub async fn stop(&self) {
        let Some(RunningLoop { cancel, task }) = self.running.lock().await.take() else {
            return;
        };

        cancel.cancel();
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Scheduler task ended abnormally");
        }
        tracing::info!("Scheduler stopped");
    }

    /// Run one cycle on the caller's task, outside the loop's cadence.
    pub async fn trigger_now(&self) -> Result<SweepReport, SweepError> {
        tracing::info!("Manual sweep triggered");
        self.sweeper.run_cycle().await
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }
}

async fn run_loop(sweeper: Arc<DueSweeper>, config: SchedulerConfig, cancel: CancellationToken) {
    let mut last_idle_log: Option<Instant> = None;

    loop {
        match sweeper.run_cycle().await {
            Ok(report) if report.is_idle() => {
                if last_idle_log.is_none_or(|at| at.elapsed() >= config.idle_log_interval) {
                    tracing::info!("No posts due for publishing");
                    last_idle_log = Some(Instant::now());
                }
            }
            Ok(report) if !report.committed => {
                tracing::warn!(claimed = report.claimed, "Sweep rolled back, posts will be retried");
            }
            Ok(report) => {
                tracing::info!(processed = report.processed, "Processed {} posts", report.processed);
            }
            Err(e) => tracing::error!(error = %e, "Sweep cycle failed"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(config.interval) => {}
        }
    }
}
