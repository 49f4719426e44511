//! Job Logging Core Library
//!
//! Execution context and pluggable logging for an asynchronous job service.
//!
//! ## Overview
//!
//! Every job gets a [`JobContext`]: a frozen copy of its configuration, a
//! handle to the job tracker and a [`CompositeLogger`] that fans each
//! record out to file, stream and row-store backends. Sweepers retire old
//! logs on a schedule, getters read stored logs back, and periodic health
//! checkers watch the service's dependencies.
//!
//! ## Core Principles
//!
//! - **Isolated backends**: a failing backend never stops the others
//! - **Explicit lifecycle**: loggers are closed exactly once; the row-store
//!   backend writes its single row at that point
//! - **Cancellable**: every background task follows one cancellation token
//!
//! ## Quick Start
//!
//! ```ignore
//! use joblog_core::{JobContext, LoggerExt, ServiceConfig, ServiceEnvironment};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::load("/etc/joblog/config.yml")?;
//!     let env = ServiceEnvironment::bootstrap(&config, CancellationToken::new()).await?;
//!
//!     let ctx = JobContext::build(&env, &env, tracker).await?;
//!     ctx.logger().info("replication started");
//!     ctx.finish()?;
//!
//!     let log = env.retrieve(&ctx.job().id)?;
//!     env.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod error;
pub mod factory;
pub mod getter;
pub mod health;
pub mod job;
pub mod level;
pub mod logger;
pub mod registry;
pub mod rowstore;
pub mod sweeper;

// Re-exports
pub use bootstrap::ServiceEnvironment;
pub use catalog::BackendCatalog;
pub use config::{LoggerPolicy, Options, ServiceConfig, SettingValue, SweeperPolicy};
pub use error::{CheckResult, HealthError, LogError, LogResult};
pub use getter::{DbGetter, FileGetter, Getter, TailGetter};
pub use health::{Checker, HealthAggregator, HttpProbe, OverallStatus, PeriodicChecker};
pub use job::{ConfigSource, JobContext, JobInfo, JobKind, JobStatus, OpCommand, Tracker};
pub use level::LogLevel;
pub use logger::{
    Backend, Closable, CompositeLogger, DbBackend, FileBackend, LoggerExt, ServiceLoggerLayer,
    StreamBackend, StreamOutput,
};
pub use registry::{BackendDescriptor, Capabilities, Registry};
pub use rowstore::{LogRow, RedbRowStore, RowStore, RowStoreReadiness};
pub use sweeper::{DbSweeper, FileSweeper, Sweeper, SweeperController};
