//! Row-store backend.
//!
//! Buffers every formatted record in memory and writes a single row keyed
//! by the job id when closed. Nothing reaches the row store before
//! `close`; records of a backend that is never closed are lost.

use std::sync::Arc;

use parking_lot::Mutex;

use super::record::Record;
use super::{Backend, Closable};
use crate::error::{LogError, LogResult};
use crate::level::LogLevel;
use crate::rowstore::RowStore;

pub struct DbBackend {
    key: String,
    level: LogLevel,
    /// Caller depth from configuration. Not read when formatting: the
    /// source location comes from `#[track_caller]` on the emit methods.
    depth: usize,
    store: Arc<dyn RowStore>,
    /// `None` once the row has been written
    buffer: Mutex<Option<Vec<u8>>>,
}

impl DbBackend {
    pub fn new(key: impl Into<String>, level: LogLevel, depth: usize, store: Arc<dyn RowStore>) -> LogResult<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(LogError::InvalidConfig(
                "DB logger requires a non-empty key".into(),
            ));
        }
        Ok(Self {
            key,
            level,
            depth,
            store,
            buffer: Mutex::new(Some(Vec::new())),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Bytes buffered so far.
    pub fn buffered_len(&self) -> usize {
        self.buffer.lock().as_ref().map(Vec::len).unwrap_or(0)
    }
}

impl Backend for DbBackend {
    fn name(&self) -> &str {
        crate::registry::DB
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.level.allows(record.level) {
            return;
        }
        let line = record.format_line();
        if let Some(buffer) = self.buffer.lock().as_mut() {
            buffer.extend_from_slice(line.as_bytes());
        }
    }

    fn closable(&self) -> Option<&dyn Closable> {
        Some(self)
    }
}

impl Closable for DbBackend {
    fn close(&self) -> LogResult<()> {
        let content = self.buffer.lock().take().ok_or_else(|| {
            LogError::Precondition(format!("DB logger for {} is already closed", self.key))
        })?;
        self.store.create(&self.key, &content)
    }
}
