//! Pluggable job loggers.
//!
//! A [`Backend`] writes records to one destination. Backends that hold
//! resources also expose [`Closable`] through [`Backend::closable`], which
//! is how [`CompositeLogger`] finds out what to close.
//!
//! ## Architecture
//!
//! ```text
//! CompositeLogger ──┬── FileBackend     <base_dir>/<job_id>.log
//!                   ├── StreamBackend   stdout / stderr
//!                   └── DbBackend       one row per job, written on close
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use joblog_core::logger::{CompositeLogger, LoggerExt};
//!
//! let logger = CompositeLogger::new(vec![file, stdout])?;
//! logger.info("job started");
//! logger.infof(format_args!("processed {} artifacts", n));
//! logger.close()?;
//! ```

use std::fmt;
use std::panic::Location;

use crate::error::LogResult;
use crate::level::LogLevel;

pub mod composite;
pub mod db;
pub mod file;
pub mod layer;
pub mod record;
pub mod stream;

pub use composite::CompositeLogger;
pub use db::DbBackend;
pub use file::FileBackend;
pub use layer::ServiceLoggerLayer;
pub use record::{Record, SourceLocation};
pub use stream::{StreamBackend, StreamOutput};

/// A single log destination.
///
/// Implementations must tolerate concurrent callers; they may serialise
/// writes internally.
pub trait Backend: Send + Sync {
    /// Registry name of the backend, used in aggregated errors.
    fn name(&self) -> &str;

    /// Minimum level this backend writes.
    fn level(&self) -> LogLevel;

    /// Write one record. Records below [`Backend::level`] are dropped.
    fn log(&self, record: &Record<'_>);

    /// Capability test for backends holding resources that must be released.
    fn closable(&self) -> Option<&dyn Closable> {
        None
    }
}

/// Backends that flush or release resources on shutdown.
pub trait Closable {
    fn close(&self) -> LogResult<()>;
}

/// The ten emission entry points (five levels, direct and formatted).
///
/// Implemented for every [`Backend`]. Source attribution is taken from the
/// caller of these methods, so it points at job code rather than at the
/// logging layers in between.
pub trait LoggerExt: Backend {
    #[track_caller]
    fn emit(&self, level: LogLevel, msg: impl fmt::Display) {
        dispatch(self, level, format_args!("{}", msg), Location::caller());
    }

    #[track_caller]
    fn emitf(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        dispatch(self, level, args, Location::caller());
    }

    #[track_caller]
    fn debug(&self, msg: impl fmt::Display) {
        dispatch(self, LogLevel::Debug, format_args!("{}", msg), Location::caller());
    }

    #[track_caller]
    fn debugf(&self, args: fmt::Arguments<'_>) {
        dispatch(self, LogLevel::Debug, args, Location::caller());
    }

    #[track_caller]
    fn info(&self, msg: impl fmt::Display) {
        dispatch(self, LogLevel::Info, format_args!("{}", msg), Location::caller());
    }

    #[track_caller]
    fn infof(&self, args: fmt::Arguments<'_>) {
        dispatch(self, LogLevel::Info, args, Location::caller());
    }

    #[track_caller]
    fn warning(&self, msg: impl fmt::Display) {
        dispatch(self, LogLevel::Warning, format_args!("{}", msg), Location::caller());
    }

    #[track_caller]
    fn warningf(&self, args: fmt::Arguments<'_>) {
        dispatch(self, LogLevel::Warning, args, Location::caller());
    }

    #[track_caller]
    fn error(&self, msg: impl fmt::Display) {
        dispatch(self, LogLevel::Error, format_args!("{}", msg), Location::caller());
    }

    #[track_caller]
    fn errorf(&self, args: fmt::Arguments<'_>) {
        dispatch(self, LogLevel::Error, args, Location::caller());
    }

    /// Logs at FATAL. Unlike a process logger this never exits; the job decides.
    #[track_caller]
    fn fatal(&self, msg: impl fmt::Display) {
        dispatch(self, LogLevel::Fatal, format_args!("{}", msg), Location::caller());
    }

    #[track_caller]
    fn fatalf(&self, args: fmt::Arguments<'_>) {
        dispatch(self, LogLevel::Fatal, args, Location::caller());
    }
}

impl<T: Backend + ?Sized> LoggerExt for T {}

fn dispatch<B: Backend + ?Sized>(
    backend: &B,
    level: LogLevel,
    args: fmt::Arguments<'_>,
    caller: &'static Location<'static>,
) {
    if !backend.level().allows(level) {
        return;
    }
    // A failing Display impl skips the record.
    let Some(message) = record::render(args) else {
        return;
    };
    backend.log(&Record::new(level, &message, caller.into()));
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording backends shared by the logger tests.

    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Keeps every message it receives.
    pub struct RecordingBackend {
        pub name: String,
        pub level: LogLevel,
        pub seen: Mutex<Vec<(LogLevel, String, u32)>>,
        pub closes: AtomicUsize,
        pub fail_close: bool,
        pub closable: bool,
    }

    impl RecordingBackend {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                level: LogLevel::Debug,
                seen: Mutex::new(Vec::new()),
                closes: AtomicUsize::new(0),
                fail_close: false,
                closable: true,
            }
        }

        pub fn messages(&self) -> Vec<String> {
            self.seen.lock().iter().map(|(_, m, _)| m.clone()).collect()
        }

        pub fn close_count(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    impl Backend for RecordingBackend {
        fn name(&self) -> &str {
            &self.name
        }

        fn level(&self) -> LogLevel {
            self.level
        }

        fn log(&self, record: &Record<'_>) {
            if self.level.allows(record.level) {
                self.seen
                    .lock()
                    .push((record.level, record.message.to_string(), record.location.line));
            }
        }

        fn closable(&self) -> Option<&dyn Closable> {
            if self.closable {
                Some(self)
            } else {
                None
            }
        }
    }

    impl Closable for RecordingBackend {
        fn close(&self) -> LogResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                Err(crate::error::LogError::Precondition(format!(
                    "{} refused to close",
                    self.name
                )))
            } else {
                Ok(())
            }
        }
    }
}
