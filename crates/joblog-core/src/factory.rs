//! Factories turning option lists into backends, sweepers and getters.
//!
//! Each factory parses the name-keyed options into a typed record first.
//! Unknown fields are ignored; a missing required field is an
//! `InvalidConfig` error.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Options, SettingValue};
use crate::error::{LogError, LogResult};
use crate::getter::{DbGetter, FileGetter, Getter};
use crate::level::LogLevel;
use crate::logger::{Backend, DbBackend, FileBackend, StreamBackend, StreamOutput};
use crate::rowstore::{RowStore, RowStoreReadiness};
use crate::sweeper::{DbSweeper, FileSweeper, Sweeper};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Shared collaborators handed to every factory.
#[derive(Clone)]
pub struct FactoryContext {
    pub row_store: Option<Arc<dyn RowStore>>,
    pub readiness: Arc<RowStoreReadiness>,
}

impl FactoryContext {
    /// Context without a row store; DB factories will fail.
    pub fn without_row_store() -> Self {
        Self {
            row_store: None,
            readiness: Arc::new(RowStoreReadiness::new()),
        }
    }

    pub fn with_row_store(store: Arc<dyn RowStore>, readiness: Arc<RowStoreReadiness>) -> Self {
        Self {
            row_store: Some(store),
            readiness,
        }
    }

    fn require_row_store(&self) -> LogResult<Arc<dyn RowStore>> {
        self.row_store.clone().ok_or_else(|| {
            LogError::InvalidConfig("DB backend requires a configured database".into())
        })
    }
}

impl Default for FactoryContext {
    fn default() -> Self {
        Self::without_row_store()
    }
}

fn lookup<'a>(opts: &'a Options, field: &str) -> Option<&'a SettingValue> {
    opts.iter().find(|(k, _)| k == field).map(|(_, v)| v)
}

fn string_field(opts: &Options, field: &str) -> Option<String> {
    match lookup(opts, field)? {
        SettingValue::Str(s) if !s.is_empty() => Some(s.clone()),
        SettingValue::Int(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_string(opts: &Options, backend: &str, field: &str) -> LogResult<String> {
    string_field(opts, field).ok_or_else(|| {
        LogError::InvalidConfig(format!("{} requires setting '{}'", backend, field))
    })
}

fn level_field(opts: &Options) -> LogLevel {
    string_field(opts, "level")
        .map(|s| LogLevel::parse(&s))
        .unwrap_or_default()
}

fn depth_field(opts: &Options) -> usize {
    lookup(opts, "depth")
        .and_then(SettingValue::as_int)
        .map(|d| d.max(0) as usize)
        .unwrap_or(0)
}

/// Retention in days, normalised to at least one.
fn duration_field(opts: &Options) -> i64 {
    let days = match lookup(opts, "duration") {
        Some(SettingValue::Duration(d)) => (d.as_secs() / SECS_PER_DAY) as i64,
        Some(other) => other.as_int().unwrap_or(0),
        None => 0,
    };
    days.max(1)
}

/// Typed options of the FILE logger.
#[derive(Debug, Clone, PartialEq)]
pub struct FileLoggerOptions {
    pub base_dir: PathBuf,
    pub filename: String,
    pub level: LogLevel,
    pub depth: usize,
}

impl FileLoggerOptions {
    pub fn parse(opts: &Options) -> LogResult<Self> {
        Ok(Self {
            base_dir: required_string(opts, "file logger", "base_dir")?.into(),
            filename: required_string(opts, "file logger", "filename")?,
            level: level_field(opts),
            depth: depth_field(opts),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StdLoggerOptions {
    pub output: StreamOutput,
    pub level: LogLevel,
    pub depth: usize,
}

impl StdLoggerOptions {
    pub fn parse(opts: &Options) -> LogResult<Self> {
        let output = match string_field(opts, "output") {
            Some(s) => StreamOutput::parse(&s)?,
            None => StreamOutput::StdOut,
        };
        Ok(Self {
            output,
            level: level_field(opts),
            depth: depth_field(opts),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbLoggerOptions {
    pub key: String,
    pub level: LogLevel,
    pub depth: usize,
}

impl DbLoggerOptions {
    pub fn parse(opts: &Options) -> LogResult<Self> {
        Ok(Self {
            key: required_string(opts, "DB logger", "key")?,
            level: level_field(opts),
            depth: depth_field(opts),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileSweeperOptions {
    pub work_dir: PathBuf,
    pub duration: i64,
}

impl FileSweeperOptions {
    pub fn parse(opts: &Options) -> LogResult<Self> {
        Ok(Self {
            work_dir: required_string(opts, "file sweeper", "work_dir")?.into(),
            duration: duration_field(opts),
        })
    }
}

pub fn file_logger(_ctx: &FactoryContext, opts: &Options) -> LogResult<Arc<dyn Backend>> {
    let o = FileLoggerOptions::parse(opts)?;
    Ok(Arc::new(FileBackend::new(
        &o.base_dir,
        &o.filename,
        o.level,
        o.depth,
    )?))
}

pub fn std_logger(_ctx: &FactoryContext, opts: &Options) -> LogResult<Arc<dyn Backend>> {
    let o = StdLoggerOptions::parse(opts)?;
    Ok(Arc::new(StreamBackend::new(o.level, o.output, o.depth)))
}

pub fn db_logger(ctx: &FactoryContext, opts: &Options) -> LogResult<Arc<dyn Backend>> {
    let o = DbLoggerOptions::parse(opts)?;
    let store = ctx.require_row_store()?;
    Ok(Arc::new(DbBackend::new(o.key, o.level, o.depth, store)?))
}

pub fn file_sweeper(_ctx: &FactoryContext, opts: &Options) -> LogResult<Arc<dyn Sweeper>> {
    let o = FileSweeperOptions::parse(opts)?;
    Ok(Arc::new(FileSweeper::new(o.work_dir, o.duration)))
}

pub fn db_sweeper(ctx: &FactoryContext, opts: &Options) -> LogResult<Arc<dyn Sweeper>> {
    let store = ctx.require_row_store()?;
    Ok(Arc::new(DbSweeper::new(
        store,
        ctx.readiness.clone(),
        duration_field(opts),
    )))
}

pub fn file_getter(_ctx: &FactoryContext, opts: &Options) -> LogResult<Arc<dyn Getter>> {
    let base_dir = required_string(opts, "file getter", "base_dir")?;
    Ok(Arc::new(FileGetter::new(base_dir)))
}

pub fn db_getter(ctx: &FactoryContext, _opts: &Options) -> LogResult<Arc<dyn Getter>> {
    Ok(Arc::new(DbGetter::new(ctx.require_row_store()?)))
}
