//! Sweeper for file-backed logs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::debug;

use super::{normalize_days, Sweeper};
use crate::error::{LogError, LogResult};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Removes regular files in `work_dir` whose modification time is older
/// than the retention period. Subdirectories are left alone.
#[derive(Debug, Clone)]
pub struct FileSweeper {
    work_dir: PathBuf,
    duration: i64,
}

impl FileSweeper {
    pub fn new(work_dir: impl Into<PathBuf>, duration: i64) -> Self {
        Self {
            work_dir: work_dir.into(),
            duration: normalize_days(duration),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn cutoff(&self, now: SystemTime) -> SystemTime {
        let age = Duration::from_secs(self.duration as u64 * SECS_PER_DAY);
        now.checked_sub(age).unwrap_or(SystemTime::UNIX_EPOCH)
    }

    /// Sweep against an explicit clock.
    pub fn sweep_at(&self, now: SystemTime) -> LogResult<usize> {
        let entries = match fs::read_dir(&self.work_dir) {
            Ok(entries) => entries,
            // Nothing has been written yet.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let cutoff = self.cutoff(now);
        let mut removed = 0;
        let mut failures = Vec::new();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    failures.push(e.to_string());
                    continue;
                }
            };
            let path = entry.path();

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    failures.push(format!("{}: {}", path.display(), e));
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let modified = match metadata.modified() {
                Ok(t) => t,
                Err(e) => {
                    failures.push(format!("{}: {}", path.display(), e));
                    continue;
                }
            };
            if modified >= cutoff {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "Removed expired log file");
                    removed += 1;
                }
                Err(e) => failures.push(format!("{}: {}", path.display(), e)),
            }
        }

        if failures.is_empty() {
            Ok(removed)
        } else {
            Err(LogError::Sweep {
                dir: self.work_dir.display().to_string(),
                removed,
                failures,
            })
        }
    }
}

impl Sweeper for FileSweeper {
    fn sweep(&self) -> LogResult<usize> {
        self.sweep_at(SystemTime::now())
    }

    fn duration(&self) -> i64 {
        self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn touch(path: &Path, age: Duration) {
        let file = File::create(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    const DAY: Duration = Duration::from_secs(SECS_PER_DAY);

    #[test]
    fn test_removes_only_expired_files() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("old.log"), DAY * 6);
        touch(&temp.path().join("new.log"), Duration::ZERO);

        let sweeper = FileSweeper::new(temp.path(), 5);
        assert_eq!(sweeper.sweep().unwrap(), 1);

        assert!(!temp.path().join("old.log").exists());
        assert!(temp.path().join("new.log").exists());
    }

    #[test]
    fn test_second_sweep_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("a.log"), DAY * 10);
        touch(&temp.path().join("b.log"), DAY * 10);

        let sweeper = FileSweeper::new(temp.path(), 2);
        assert_eq!(sweeper.sweep().unwrap(), 2);
        assert_eq!(sweeper.sweep().unwrap(), 0);
    }

    #[test]
    fn test_directories_are_skipped() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("nested");
        fs::create_dir(&nested).unwrap();
        touch(&nested.join("deep.log"), DAY * 30);

        let sweeper = FileSweeper::new(temp.path(), 1);
        assert_eq!(sweeper.sweep().unwrap(), 0);
        assert!(nested.join("deep.log").exists());
    }

    #[test]
    fn test_missing_work_dir_sweeps_nothing() {
        let temp = TempDir::new().unwrap();
        let sweeper = FileSweeper::new(temp.path().join("absent"), 1);
        assert_eq!(sweeper.sweep().unwrap(), 0);
    }

    #[test]
    fn test_duration_normalised() {
        assert_eq!(FileSweeper::new("/tmp", 0).duration(), 1);
        assert_eq!(FileSweeper::new("/tmp", -4).duration(), 1);
        assert_eq!(FileSweeper::new("/tmp", 7).duration(), 7);
    }

    #[test]
    fn test_explicit_clock() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("today.log"), Duration::ZERO);

        let sweeper = FileSweeper::new(temp.path(), 3);
        assert_eq!(sweeper.sweep_at(SystemTime::now() + DAY * 2).unwrap(), 0);
        assert_eq!(sweeper.sweep_at(SystemTime::now() + DAY * 4).unwrap(), 1);
    }

    #[test]
    fn test_kind_names_concrete_type() {
        let sweeper = FileSweeper::new("/tmp", 1);
        let dynamic: &dyn Sweeper = &sweeper;
        assert!(dynamic.kind().ends_with("FileSweeper"));
    }
}
