//! Background probing with a latched result.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Checker, Probe};
use crate::error::{CheckResult, HealthError};

/// Checker that reports the last result of a background probe.
///
/// Until the first probe completes, [`Checker::check`] returns
/// [`HealthError::Unknown`], never success.
pub struct PeriodicChecker {
    latest: Arc<RwLock<CheckResult>>,
    handle: JoinHandle<()>,
}

impl PeriodicChecker {
    /// Start probing now and again `period` after each probe completes.
    pub fn spawn(name: impl Into<String>, probe: Probe, period: Duration, cancel: CancellationToken) -> Self {
        let latest = Arc::new(RwLock::new(Err(HealthError::Unknown)));
        let handle = tokio::spawn(run(name.into(), probe, period, latest.clone(), cancel));
        Self { latest, handle }
    }

    /// The latched result.
    pub fn latest(&self) -> CheckResult {
        self.latest.read().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Checker for PeriodicChecker {
    fn check(&self) -> BoxFuture<'_, CheckResult> {
        let result = self.latest();
        Box::pin(async move { result })
    }
}

impl Drop for PeriodicChecker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(
    name: String,
    probe: Probe,
    period: Duration,
    latest: Arc<RwLock<CheckResult>>,
    cancel: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = probe() => result,
        };

        let previous = std::mem::replace(&mut *latest.write(), result.clone());
        if previous.is_ok() != result.is_ok() {
            match &result {
                Ok(()) => info!(component = %name, "Component is healthy"),
                Err(e) => info!(component = %name, error = %e, "Component is unhealthy"),
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(period) => {}
        }
    }
    debug!(component = %name, "Periodic health checker stopped");
}
