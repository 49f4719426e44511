//! Per-job execution context.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::retry::RetryPolicy;
use super::tracker::{JobInfo, JobStatus, Tracker};
use super::ConfigSource;
use crate::bootstrap::ServiceEnvironment;
use crate::catalog::BackendCatalog;
use crate::config::{set_option, LoggerPolicy};
use crate::error::LogResult;
use crate::logger::{Backend, Closable, CompositeLogger};
use crate::registry;

/// Caller depth of job FILE and DB loggers.
pub const JOB_LOGGER_DEPTH: i64 = 5;

/// Command a running job should obey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCommand {
    Stop,
}

/// Everything a job sees while it runs.
///
/// Built when the job is dispatched and dropped when it returns. The
/// property map is a private copy, so configuration changes made while the
/// job runs are not visible to it.
pub struct JobContext {
    system: CancellationToken,
    properties: HashMap<String, serde_json::Value>,
    logger: Arc<CompositeLogger>,
    tracker: Arc<dyn Tracker>,
}

impl JobContext {
    /// Build a context with the default retry policy for the config snapshot.
    pub async fn build(
        env: &ServiceEnvironment,
        source: &dyn ConfigSource,
        tracker: Arc<dyn Tracker>,
    ) -> LogResult<Self> {
        Self::build_with(env, source, tracker, &RetryPolicy::default()).await
    }

    pub async fn build_with(
        env: &ServiceEnvironment,
        source: &dyn ConfigSource,
        tracker: Arc<dyn Tracker>,
        retry: &RetryPolicy,
    ) -> LogResult<Self> {
        let properties = retry
            .run("job configuration snapshot", move || async move { source.snapshot() })
            .await?;

        let job = tracker.job();
        let logger = build_job_logger(env.catalog(), env.job_loggers(), &job.id)?;
        debug!(job_id = %job.id, backends = logger.len(), "Built job context");

        Ok(Self {
            system: env.cancellation_token().child_token(),
            properties,
            logger: Arc::new(logger),
            tracker,
        })
    }

    /// Property from the configuration snapshot.
    pub fn get(&self, property: &str) -> Option<&serde_json::Value> {
        self.properties.get(property)
    }

    /// Cancellation handle of the hosting service.
    pub fn system_context(&self) -> &CancellationToken {
        &self.system
    }

    /// Forward a short status line to the tracker.
    pub fn checkin(&self, status: &str) -> LogResult<()> {
        self.tracker.check_in(status)
    }

    /// `Some(Stop)` once the job has been stopped, `None` otherwise.
    ///
    /// A tracker that cannot report its status yields `None`.
    pub fn op_command(&self) -> Option<OpCommand> {
        match self.tracker.status() {
            Ok(JobStatus::Stopped) => Some(OpCommand::Stop),
            Ok(_) => None,
            Err(e) => {
                debug!(job_id = %self.tracker.job().id, error = %e, "Cannot read job status");
                None
            }
        }
    }

    pub fn logger(&self) -> &Arc<CompositeLogger> {
        &self.logger
    }

    pub fn job(&self) -> &JobInfo {
        self.tracker.job()
    }

    /// Close the job logger, flushing every closable backend.
    pub fn finish(&self) -> LogResult<()> {
        self.logger.close()
    }
}

/// Composite over fresh job-scoped backends for `job_id`.
///
/// FILE backends write `<job_id>.log` and DB backends use `job_id` as key.
pub fn build_job_logger(
    catalog: &BackendCatalog,
    policies: &[LoggerPolicy],
    job_id: &str,
) -> LogResult<CompositeLogger> {
    let mut backends: Vec<Arc<dyn Backend>> = Vec::with_capacity(policies.len());
    for policy in policies {
        let mut opts = policy.logger_options();
        if catalog.is_backend(&policy.name, registry::FILE) {
            set_option(&mut opts, "filename", format!("{}.log", job_id));
            set_option(&mut opts, "depth", JOB_LOGGER_DEPTH);
        } else if catalog.is_backend(&policy.name, registry::DB) {
            set_option(&mut opts, "key", job_id);
            set_option(&mut opts, "depth", JOB_LOGGER_DEPTH);
        }
        backends.push(catalog.get_logger(&policy.name, &opts)?);
    }
    CompositeLogger::new(backends)
}
