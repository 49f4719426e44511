//! Log record type and its line format.
//!
//! Every backend writes the same single-line text format:
//!
//! ```text
//! 2026-10-17T08:14:09Z [INFO] [src/jobs/gc.rs:42]: deleted 12 blobs
//! ```

use std::fmt;
use std::panic::Location;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::level::LogLevel;

/// Source position a record is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation<'a> {
    pub file: &'a str,
    pub line: u32,
}

impl<'a> SourceLocation<'a> {
    pub fn new(file: &'a str, line: u32) -> Self {
        Self { file, line }
    }
}

impl From<&'static Location<'static>> for SourceLocation<'static> {
    fn from(loc: &'static Location<'static>) -> Self {
        Self {
            file: loc.file(),
            line: loc.line(),
        }
    }
}

/// A single log record as delivered to backends.
///
/// Records borrow their message; they are never queued, so each backend
/// formats what it needs before `log` returns.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    pub level: LogLevel,
    pub message: &'a str,
    pub location: SourceLocation<'a>,
    pub time: DateTime<Utc>,
}

impl<'a> Record<'a> {
    /// Create a record stamped with the current time.
    pub fn new(level: LogLevel, message: &'a str, location: SourceLocation<'a>) -> Self {
        Self {
            level,
            message,
            location,
            time: Utc::now(),
        }
    }

    /// Render the record as one line, including the trailing newline.
    pub fn format_line(&self) -> String {
        format!(
            "{} [{}] [{}:{}]: {}\n",
            self.time.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.level,
            self.location.file,
            self.location.line,
            self.message
        )
    }
}

/// Render format arguments into a string.
///
/// Returns `None` when a `Display` implementation inside `args` reports an
/// error; the caller drops the record instead of panicking.
pub fn render(args: fmt::Arguments<'_>) -> Option<String> {
    if let Some(s) = args.as_str() {
        return Some(s.to_string());
    }
    let mut buf = String::new();
    fmt::write(&mut buf, args).ok()?;
    Some(buf)
}
