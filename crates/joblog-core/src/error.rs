//! Error types for the job logging subsystem

use thiserror::Error;

/// Main error type for logger, sweeper, getter and bootstrap operations
#[derive(Error, Debug)]
pub enum LogError {
    /// Missing or malformed setting, unknown backend in a policy
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backend name is not present in the registry
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// Requested log does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller passed an unusable argument (e.g. empty log id)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not allowed in the current state (e.g. close called twice)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Row store rejected or failed an operation
    #[error("Row store error: {0}")]
    RowStore(String),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Another process (usually the running job service) holds the database lock
    #[error("Database {} is locked by another process", .0.display())]
    DatabaseLocked(std::path::PathBuf),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// One or more backends failed to close
    #[error("{} backend(s) failed to close: {}", .0.len(), join_failures(.0))]
    Aggregate(Vec<BackendFailure>),

    /// Some files in a swept directory could not be removed
    #[error("sweeping {dir} removed {removed} file(s) but failed on {}: {}", .failures.len(), .failures.join("; "))]
    Sweep {
        dir: String,
        removed: usize,
        failures: Vec<String>,
    },

    /// A blocking task was cancelled or panicked
    #[error("Task error: {0}")]
    Task(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for LogError {
    fn from(e: serde_json::Error) -> Self {
        LogError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for LogError {
    fn from(e: serde_yaml::Error) -> Self {
        LogError::InvalidConfig(e.to_string())
    }
}

/// Close failure of a single named backend inside an aggregate
#[derive(Debug)]
pub struct BackendFailure {
    pub backend: String,
    pub error: LogError,
}

fn join_failures(failures: &[BackendFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.backend, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias using LogError
pub type LogResult<T> = Result<T, LogError>;

/// Outcome of a health probe that did not succeed.
///
/// Cloneable because periodic checkers hand the latched result to every reader.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HealthError {
    /// No probe has completed yet
    #[error("unknown status")]
    Unknown,

    /// The aggregator gave up waiting for the probe
    #[error("failed to check the health status: timeout")]
    Timeout,

    /// The probe ran and reported a failure
    #[error("{0}")]
    Failed(String),
}

/// Result of a single health check
pub type CheckResult = Result<(), HealthError>;
