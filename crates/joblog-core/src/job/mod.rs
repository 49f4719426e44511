//! Job execution support: context, tracker surface and retries.

pub mod context;
pub mod retry;
pub mod tracker;

pub use context::{build_job_logger, JobContext, OpCommand, JOB_LOGGER_DEPTH};
pub use retry::RetryPolicy;
pub use tracker::{JobInfo, JobKind, JobStatus, Tracker};

use std::collections::HashMap;

use crate::bootstrap::ServiceEnvironment;
use crate::error::LogResult;

/// Where job properties come from.
pub trait ConfigSource: Send + Sync {
    /// A deep copy of the current properties.
    fn snapshot(&self) -> LogResult<HashMap<String, serde_json::Value>>;
}

impl ConfigSource for HashMap<String, serde_json::Value> {
    fn snapshot(&self) -> LogResult<HashMap<String, serde_json::Value>> {
        Ok(self.clone())
    }
}

impl ConfigSource for ServiceEnvironment {
    fn snapshot(&self) -> LogResult<HashMap<String, serde_json::Value>> {
        Ok(self.job_properties().clone())
    }
}
