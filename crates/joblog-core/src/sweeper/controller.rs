//! Sweeper supervision.
//!
//! ```text
//! SweeperController::sweep
//!   ├── error drain     mpsc(1) -> tracing::error!
//!   ├── schedule(FileSweeper)   run now, then every N days
//!   └── schedule(DbSweeper)     run now, then every M days
//! ```
//!
//! Every task stops when the controller's cancellation token fires.
//! A failed sweep is reported and the schedule carries on.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::Sweeper;
use crate::error::{BackendFailure, LogError, LogResult};

/// One day, the unit of sweeper periods.
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest schedule period, in days.
pub const MAX_PERIOD_DAYS: u32 = 100 * 365;

/// Schedule period for a sweeper of `days` retention: at least one unit,
/// at most [`MAX_PERIOD_DAYS`] units, never below one millisecond.
fn period_for(unit: Duration, days: i64) -> Duration {
    let days = u32::try_from(days.max(1))
        .unwrap_or(u32::MAX)
        .min(MAX_PERIOD_DAYS);
    unit.saturating_mul(days).max(Duration::from_millis(1))
}

/// A sweep error, tagged with its origin.
#[derive(Debug)]
pub struct SweepFailure {
    /// Runtime type of the failing sweeper
    pub sweeper: &'static str,
    /// Unix timestamp of the failure
    pub at: i64,
    pub error: LogError,
}

/// Outcome of [`SweeperController::sweep_once`].
#[derive(Debug, Default)]
pub struct SweepSummary {
    pub removed: usize,
    pub failures: Vec<BackendFailure>,
}

impl SweepSummary {
    /// `Ok(removed)` if every sweeper succeeded.
    pub fn into_result(self) -> LogResult<usize> {
        if self.failures.is_empty() {
            Ok(self.removed)
        } else {
            Err(LogError::Aggregate(self.failures))
        }
    }
}

/// Runs each sweeper on its own period until cancelled.
pub struct SweeperController {
    cancel: CancellationToken,
    sweepers: Vec<Arc<dyn Sweeper>>,
    period_unit: Duration,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SweeperController {
    /// Controller bound to a child of `parent`.
    pub fn new(parent: &CancellationToken, sweepers: Vec<Arc<dyn Sweeper>>) -> Self {
        Self {
            cancel: parent.child_token(),
            sweepers,
            period_unit: DAY,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Scale sweeper periods by `unit` instead of one day.
    pub fn with_period_unit(mut self, unit: Duration) -> Self {
        self.period_unit = unit;
        self
    }

    /// Always `-1`; the controller is not a sweeper itself.
    pub fn duration(&self) -> i64 {
        -1
    }

    pub fn len(&self) -> usize {
        self.sweepers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sweepers.is_empty()
    }

    /// Start the error drain and one schedule per sweeper.
    ///
    /// Each sweeper runs immediately, then every `max(duration, 1)` days.
    /// Must be called from within a tokio runtime; a second call fails.
    pub fn sweep(&self) -> LogResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LogError::Task(format!("sweeper controller needs a runtime: {}", e)))?;

        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            return Err(LogError::Precondition(
                "sweeper controller is already running".into(),
            ));
        }

        let (tx, rx) = mpsc::channel(1);
        handles.push(runtime.spawn(drain_errors(rx, self.cancel.clone())));

        for sweeper in &self.sweepers {
            let period = period_for(self.period_unit, sweeper.duration());
            handles.push(runtime.spawn(schedule(
                sweeper.clone(),
                period,
                tx.clone(),
                self.cancel.clone(),
            )));
        }

        info!(sweepers = self.sweepers.len(), "Sweeper controller started");
        Ok(())
    }

    /// Run every sweeper once, in order, on the calling thread.
    pub fn sweep_once(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for sweeper in &self.sweepers {
            match sweeper.sweep() {
                Ok(n) => summary.removed += n,
                Err(error) => {
                    if let LogError::Sweep { removed, .. } = &error {
                        summary.removed += removed;
                    }
                    summary.failures.push(BackendFailure {
                        backend: sweeper.kind().to_string(),
                        error,
                    });
                }
            }
        }
        summary
    }

    /// Cancel all tasks and wait for them to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Sweeper task ended abnormally");
            }
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

async fn drain_errors(mut rx: mpsc::Receiver<SweepFailure>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            failure = rx.recv() => match failure {
                Some(f) => error!(sweeper = f.sweeper, at = f.at, error = %f.error, "Sweep failed"),
                None => break,
            },
        }
    }
    debug!("Sweep error drain stopped");
}

async fn schedule(
    sweeper: Arc<dyn Sweeper>,
    period: Duration,
    tx: mpsc::Sender<SweepFailure>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // The first tick completes immediately.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let job = sweeper.clone();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            joined = tokio::task::spawn_blocking(move || job.sweep()) => {
                joined.unwrap_or_else(|e| Err(LogError::Task(e.to_string())))
            }
        };

        match result {
            Ok(removed) => debug!(sweeper = sweeper.kind(), removed, "Sweep finished"),
            Err(error) => {
                let failure = SweepFailure {
                    sweeper: sweeper.kind(),
                    at: Utc::now().timestamp(),
                    error,
                };
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tx.send(failure) => {}
                }
            }
        }
    }
    debug!(sweeper = sweeper.kind(), "Sweeper schedule stopped");
}
