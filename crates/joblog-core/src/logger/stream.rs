//! Standard stream backend.

use std::io::Write;

use parking_lot::Mutex;

use super::record::Record;
use super::Backend;
use crate::error::{LogError, LogResult};
use crate::level::LogLevel;

/// Which standard stream a [`StreamBackend`] writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutput {
    StdOut,
    StdErr,
}

impl StreamOutput {
    /// Parse the `output` setting (`std_out` / `std_err`).
    pub fn parse(s: &str) -> LogResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "std_out" | "stdout" => Ok(StreamOutput::StdOut),
            "std_err" | "stderr" => Ok(StreamOutput::StdErr),
            other => Err(LogError::InvalidConfig(format!(
                "unknown stream output '{}', expected std_out or std_err",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StreamOutput::StdOut => "std_out",
            StreamOutput::StdErr => "std_err",
        }
    }
}

/// Writes one formatted line per record to stdout, stderr or an injected writer.
pub struct StreamBackend {
    level: LogLevel,
    output: StreamOutput,
    /// Caller depth from configuration. Not read when formatting: the
    /// source location comes from `#[track_caller]` on the emit methods.
    depth: usize,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl StreamBackend {
    pub fn new(level: LogLevel, output: StreamOutput, depth: usize) -> Self {
        let writer: Box<dyn Write + Send> = match output {
            StreamOutput::StdOut => Box::new(std::io::stdout()),
            StreamOutput::StdErr => Box::new(std::io::stderr()),
        };
        Self {
            level,
            output,
            depth,
            writer: Mutex::new(writer),
        }
    }

    /// Backend writing to an arbitrary sink, reported as `output`.
    pub fn with_writer(level: LogLevel, output: StreamOutput, writer: Box<dyn Write + Send>) -> Self {
        Self {
            level,
            output,
            depth: 0,
            writer: Mutex::new(writer),
        }
    }

    pub fn output(&self) -> StreamOutput {
        self.output
    }

    /// Configured caller depth, kept for configuration compatibility.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Backend for StreamBackend {
    fn name(&self) -> &str {
        crate::registry::STD_OUTPUT
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.level.allows(record.level) {
            return;
        }
        let line = record.format_line();
        let mut writer = self.writer.lock();
        // Nowhere to report a failing stdout.
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }
}
