//! Health checking of external dependencies.
//!
//! A [`Checker`] answers "is this component healthy right now". Probes
//! are plain async functions; [`PeriodicChecker`] runs one in the
//! background and latches its latest result, and [`HealthAggregator`]
//! fans a set of checkers out under a single timeout.

pub mod aggregate;
pub mod http;
pub mod periodic;

pub use aggregate::{ComponentStatus, HealthAggregator, HealthState, OverallStatus, DEFAULT_TIMEOUT};
pub use http::HttpProbe;
pub use periodic::PeriodicChecker;

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::error::{CheckResult, HealthError};
use crate::rowstore::RowStore;

/// A component that can report its health.
pub trait Checker: Send + Sync {
    fn check(&self) -> BoxFuture<'_, CheckResult>;
}

/// A repeatable async health probe.
pub type Probe = Arc<dyn Fn() -> BoxFuture<'static, CheckResult> + Send + Sync>;

/// Wrap an async closure as a [`Probe`].
pub fn probe_fn<F, Fut>(f: F) -> Probe
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CheckResult> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Checker that runs its probe on every call.
pub struct ProbeChecker {
    probe: Probe,
}

impl ProbeChecker {
    pub fn new(probe: Probe) -> Self {
        Self { probe }
    }
}

impl Checker for ProbeChecker {
    fn check(&self) -> BoxFuture<'_, CheckResult> {
        (self.probe)()
    }
}

/// Pings the job log row store.
pub fn row_store_probe(store: Arc<dyn RowStore>) -> Probe {
    probe_fn(move || {
        let store = store.clone();
        async move {
            match tokio::task::spawn_blocking(move || store.ping()).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(HealthError::Failed(format!("row store ping failed: {}", e))),
                Err(e) => Err(HealthError::Failed(format!("row store ping aborted: {}", e))),
            }
        }
    })
}

/// Healthy while an object-store capacity query succeeds.
///
/// `query` returns the free capacity in bytes.
pub fn capacity_probe<F, Fut>(query: F) -> Probe
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<u64, String>> + Send + 'static,
{
    let query = Arc::new(query);
    probe_fn(move || {
        let query = query.clone();
        async move {
            query()
                .await
                .map(|_| ())
                .map_err(|e| HealthError::Failed(format!("failed to get storage capacity: {}", e)))
        }
    })
}
