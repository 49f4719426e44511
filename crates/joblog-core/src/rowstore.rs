//! Row store for persisted job logs.
//!
//! The DB backend, sweeper and getter talk to a [`RowStore`]; the service
//! ships [`RedbRowStore`], which keeps one row per job:
//!
//! ```text
//! job_logs       uuid -> content (bytes)
//! job_log_times  uuid -> creation time (unix seconds)
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::{Condvar, Mutex, RwLock};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};

use crate::error::{LogError, LogResult};

const JOB_LOGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("job_logs");
const JOB_LOG_TIMES_TABLE: TableDefinition<&str, i64> = TableDefinition::new("job_log_times");

/// A persisted job log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRow {
    pub uuid: String,
    pub content: Vec<u8>,
    pub creation_time: DateTime<Utc>,
}

/// External store of job log rows.
pub trait RowStore: Send + Sync {
    /// Insert (or replace) the row for `key`.
    fn create(&self, key: &str, content: &[u8]) -> LogResult<()>;

    /// Fetch the row for `key`.
    fn get(&self, key: &str) -> LogResult<Option<LogRow>>;

    /// Delete rows created before `cutoff`, returning how many went.
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> LogResult<usize>;

    /// Cheap liveness check.
    fn ping(&self) -> LogResult<()>;
}

/// Row store backed by a redb database file.
#[derive(Clone)]
pub struct RedbRowStore {
    db: Arc<RwLock<Database>>,
}

impl RedbRowStore {
    /// Open or create the database at `path` and initialise its tables.
    ///
    /// redb locks the file exclusively; a second opener gets
    /// [`LogError::DatabaseLocked`].
    pub fn new(path: impl AsRef<Path>) -> LogResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path).map_err(|e| match e {
            redb::DatabaseError::DatabaseAlreadyOpen => LogError::DatabaseLocked(path.to_path_buf()),
            other => LogError::from(other),
        })?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(JOB_LOGS_TABLE)?;
            let _ = write_txn.open_table(JOB_LOG_TIMES_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    /// Insert a row with an explicit creation time.
    pub fn create_at(&self, key: &str, content: &[u8], at: DateTime<Utc>) -> LogResult<()> {
        if key.is_empty() {
            return Err(LogError::InvalidArgument("row key is empty".into()));
        }
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut logs = write_txn.open_table(JOB_LOGS_TABLE)?;
            let mut times = write_txn.open_table(JOB_LOG_TIMES_TABLE)?;
            logs.insert(key, content)?;
            times.insert(key, at.timestamp())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Number of stored rows.
    pub fn len(&self) -> LogResult<usize> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(JOB_LOGS_TABLE)?;
        Ok(table.len()? as usize)
    }

    pub fn is_empty(&self) -> LogResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl RowStore for RedbRowStore {
    fn create(&self, key: &str, content: &[u8]) -> LogResult<()> {
        self.create_at(key, content, Utc::now())
    }

    fn get(&self, key: &str) -> LogResult<Option<LogRow>> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let logs = read_txn.open_table(JOB_LOGS_TABLE)?;
        let times = read_txn.open_table(JOB_LOG_TIMES_TABLE)?;

        let Some(content) = logs.get(key)? else {
            return Ok(None);
        };
        let secs = times.get(key)?.map(|v| v.value()).unwrap_or_default();
        let creation_time = Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| LogError::RowStore(format!("invalid timestamp {} for {}", secs, key)))?;

        Ok(Some(LogRow {
            uuid: key.to_string(),
            content: content.value().to_vec(),
            creation_time,
        }))
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> LogResult<usize> {
        let cutoff = cutoff.timestamp();
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        let removed;
        {
            let mut logs = write_txn.open_table(JOB_LOGS_TABLE)?;
            let mut times = write_txn.open_table(JOB_LOG_TIMES_TABLE)?;

            let mut expired = Vec::new();
            for entry in times.iter()? {
                let (key, created) = entry?;
                if created.value() < cutoff {
                    expired.push(key.value().to_string());
                }
            }

            for key in &expired {
                logs.remove(key.as_str())?;
                times.remove(key.as_str())?;
            }
            removed = expired.len();
        }
        write_txn.commit()?;
        Ok(removed)
    }

    fn ping(&self) -> LogResult<()> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let _ = read_txn.open_table(JOB_LOGS_TABLE)?;
        Ok(())
    }
}

/// "Row store is fully initialised" marker shared by every DB sweeper.
///
/// Once set it stays set, so any number of sweepers can pass the gate.
#[derive(Default)]
pub struct RowStoreReadiness {
    ready: Mutex<bool>,
    changed: Condvar,
}

impl RowStoreReadiness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Readiness marker that is already set.
    pub fn ready() -> Self {
        let readiness = Self::new();
        readiness.mark_ready();
        readiness
    }

    pub fn mark_ready(&self) {
        let mut ready = self.ready.lock();
        *ready = true;
        self.changed.notify_all();
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.lock()
    }

    /// Block until ready or until `timeout` elapses. Returns readiness.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut ready = self.ready.lock();
        if !*ready {
            let _ = self
                .changed
                .wait_while_for(&mut ready, |ready| !*ready, timeout);
        }
        *ready
    }
}
