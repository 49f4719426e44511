//! File backend for job and service logs.
//!
//! Each backend owns one file, `<base_dir>/<filename>`. The file is opened
//! in append mode with permission 0600 and is never truncated here; the
//! file sweeper removes whole files once they age out.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::record::Record;
use super::{Backend, Closable};
use crate::error::{LogError, LogResult};
use crate::level::LogLevel;

/// Writer that appends formatted records to a log file.
pub struct FileBackend {
    level: LogLevel,

    /// Path to the log file
    path: PathBuf,

    /// Caller depth from configuration. Not read when formatting: the
    /// source location comes from `#[track_caller]` on the emit methods.
    depth: usize,

    /// `None` once closed
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileBackend {
    /// Open (or create) `<base_dir>/<filename>` for appending.
    ///
    /// Creates `base_dir` if needed. Failure to open the file is returned
    /// here rather than on first write.
    pub fn new(
        base_dir: impl AsRef<Path>,
        filename: &str,
        level: LogLevel,
        depth: usize,
    ) -> LogResult<Self> {
        if filename.is_empty() {
            return Err(LogError::InvalidConfig(
                "file logger requires a non-empty filename".into(),
            ));
        }

        let base_dir = base_dir.as_ref();
        fs::create_dir_all(base_dir)?;
        let path = base_dir.join(filename);

        let file = open_append(&path)?;

        Ok(Self {
            level,
            path,
            depth,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured caller depth, kept for configuration compatibility.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether [`Closable::close`] has already run.
    pub fn is_closed(&self) -> bool {
        self.writer.lock().is_none()
    }
}

#[cfg(unix)]
fn open_append(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Backend for FileBackend {
    fn name(&self) -> &str {
        crate::registry::FILE
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.level.allows(record.level) {
            return;
        }
        let line = record.format_line();
        let mut guard = self.writer.lock();
        // Records after close are dropped.
        if let Some(writer) = guard.as_mut() {
            let _ = writer.write_all(line.as_bytes());
            let _ = writer.flush();
        }
    }

    fn closable(&self) -> Option<&dyn Closable> {
        Some(self)
    }
}

impl Closable for FileBackend {
    fn close(&self) -> LogResult<()> {
        let writer = self.writer.lock().take().ok_or_else(|| {
            LogError::Precondition(format!("{} is already closed", self.path.display()))
        })?;
        let file = writer
            .into_inner()
            .map_err(|e| LogError::Io(e.into_error()))?;
        file.sync_all()?;
        Ok(())
    }
}
