//! Sweeper for row-store logs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::{normalize_days, Sweeper};
use crate::error::{LogError, LogResult};
use crate::rowstore::{RowStore, RowStoreReadiness};

/// How long a sweep waits for the row store before giving up this round.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Deletes rows created before `now - duration` days.
///
/// Every sweep first waits on the shared readiness marker, so the first
/// sweep cannot run against an uninitialised store.
pub struct DbSweeper {
    store: Arc<dyn RowStore>,
    readiness: Arc<RowStoreReadiness>,
    duration: i64,
    ready_timeout: Duration,
}

impl DbSweeper {
    pub fn new(store: Arc<dyn RowStore>, readiness: Arc<RowStoreReadiness>, duration: i64) -> Self {
        Self {
            store,
            readiness,
            duration: normalize_days(duration),
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }
}

impl Sweeper for DbSweeper {
    fn sweep(&self) -> LogResult<usize> {
        if !self.readiness.wait(self.ready_timeout) {
            return Err(LogError::Precondition(
                "row store is not initialised yet".into(),
            ));
        }
        let cutoff = Utc::now() - chrono::Duration::days(self.duration);
        self.store.delete_older_than(cutoff)
    }

    fn duration(&self) -> i64 {
        self.duration
    }
}
