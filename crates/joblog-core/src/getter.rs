//! Log retrieval by job id.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{LogError, LogResult};
use crate::rowstore::RowStore;

/// Returns the full stored log of one job.
pub trait Getter: Send + Sync {
    /// Fails with `InvalidArgument` for an empty id and `NotFound` when
    /// nothing is stored under it.
    fn retrieve(&self, log_id: &str) -> LogResult<Vec<u8>>;
}

fn check_id(log_id: &str) -> LogResult<()> {
    if log_id.is_empty() {
        return Err(LogError::InvalidArgument("empty log id".into()));
    }
    Ok(())
}

/// Reads `<base_dir>/<log_id>.log`.
#[derive(Debug, Clone)]
pub struct FileGetter {
    base_dir: PathBuf,
}

impl FileGetter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Getter for FileGetter {
    fn retrieve(&self, log_id: &str) -> LogResult<Vec<u8>> {
        check_id(log_id)?;
        // Ids are file stems, never paths.
        if log_id.contains(['/', '\\']) || log_id == ".." || log_id == "." {
            return Err(LogError::InvalidArgument(format!(
                "invalid log id: {}",
                log_id
            )));
        }

        let path = self.base_dir.join(format!("{}.log", log_id));
        match std::fs::read(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LogError::NotFound(format!("log {} ({})", log_id, path.display())))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Returns the `content` of the row keyed by the log id.
pub struct DbGetter {
    store: Arc<dyn RowStore>,
}

impl DbGetter {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }
}

impl Getter for DbGetter {
    fn retrieve(&self, log_id: &str) -> LogResult<Vec<u8>> {
        check_id(log_id)?;
        self.store
            .get(log_id)?
            .map(|row| row.content)
            .ok_or_else(|| LogError::NotFound(format!("log {}", log_id)))
    }
}

/// Limits any getter to the last `max_bytes` of a log.
pub struct TailGetter {
    inner: Arc<dyn Getter>,
    max_bytes: usize,
}

impl TailGetter {
    pub fn new(inner: Arc<dyn Getter>, max_bytes: usize) -> Self {
        Self { inner, max_bytes }
    }
}

impl Getter for TailGetter {
    fn retrieve(&self, log_id: &str) -> LogResult<Vec<u8>> {
        Ok(tail_bytes(self.inner.retrieve(log_id)?, self.max_bytes))
    }
}

/// Keep the last `max_bytes` bytes of `data`.
pub fn tail_bytes(mut data: Vec<u8>, max_bytes: usize) -> Vec<u8> {
    if data.len() > max_bytes {
        data.drain(..data.len() - max_bytes);
    }
    data
}
