//! Service bootstrap.
//!
//! [`ServiceEnvironment::bootstrap`] turns a [`ServiceConfig`] into the
//! process-wide logging state: the service logger, the job logger policy,
//! the sweeper controller (already started) and, when some job backend
//! supports it, a log getter.
//!
//! # Example
//!
//! ```ignore
//! let cancel = CancellationToken::new();
//! let env = ServiceEnvironment::bootstrap(&config, cancel.clone()).await?;
//!
//! env.service_logger().info("job service started");
//! let log = env.retrieve("5f8a...")?;
//!
//! env.shutdown().await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::BackendCatalog;
use crate::config::{set_option, LoggerPolicy, ServiceConfig, SettingValue};
use crate::error::{LogError, LogResult};
use crate::getter::Getter;
use crate::logger::{Backend, Closable, CompositeLogger};
use crate::registry::{self, Registry};
use crate::rowstore::RowStore;
use crate::sweeper::{Sweeper, SweeperController};

/// Caller depth of service FILE and STD_OUTPUT loggers.
pub const SERVICE_LOGGER_DEPTH: i64 = 6;

/// Process-wide logging state, built once and shared by reference.
pub struct ServiceEnvironment {
    catalog: Arc<BackendCatalog>,
    service_logger: Arc<CompositeLogger>,
    job_loggers: Vec<LoggerPolicy>,
    job_properties: HashMap<String, serde_json::Value>,
    getter: Option<Arc<dyn Getter>>,
    controller: SweeperController,
    cancel: CancellationToken,
}

impl ServiceEnvironment {
    /// Build everything from `config` and start the sweeper controller.
    ///
    /// Invalid logger or sweeper settings abort bootstrap; a missing
    /// getter does not.
    pub async fn bootstrap(config: &ServiceConfig, cancel: CancellationToken) -> LogResult<Self> {
        Self::bootstrap_with(Registry::builtin(), config, cancel).await
    }

    /// As [`ServiceEnvironment::bootstrap`], with a caller-supplied registry.
    pub async fn bootstrap_with(
        registry: Registry,
        config: &ServiceConfig,
        cancel: CancellationToken,
    ) -> LogResult<Self> {
        config.validate(&registry)?;

        let catalog = Arc::new(BackendCatalog::from_config(registry, config)?);
        if let Some(db) = &config.database {
            info!(path = %db.path.display(), "Opened job log database");
        }

        let service_logger = Arc::new(build_service_logger(&catalog, &config.loggers)?);
        debug!(backends = service_logger.len(), "Built service logger");

        let sweepers = build_sweepers(&catalog, config)?;
        let controller = SweeperController::new(&cancel, sweepers);
        controller.sweep()?;

        let getter = select_getter(&catalog, &config.job_loggers);
        if getter.is_none() {
            warn!("No job logger supports retrieval; log lookups will fail");
        }

        Ok(Self {
            catalog,
            service_logger,
            job_loggers: config.job_loggers.clone(),
            job_properties: config.job_properties.clone(),
            getter,
            controller,
            cancel,
        })
    }

    /// The service-wide composite logger.
    pub fn service_logger(&self) -> Arc<CompositeLogger> {
        self.service_logger.clone()
    }

    /// Policy used to build per-job loggers.
    pub fn job_loggers(&self) -> &[LoggerPolicy] {
        &self.job_loggers
    }

    /// Properties every job starts from.
    pub fn job_properties(&self) -> &HashMap<String, serde_json::Value> {
        &self.job_properties
    }

    pub fn catalog(&self) -> &BackendCatalog {
        &self.catalog
    }

    pub fn controller(&self) -> &SweeperController {
        &self.controller
    }

    pub fn row_store(&self) -> Option<&Arc<dyn RowStore>> {
        self.catalog.context().row_store.as_ref()
    }

    pub fn has_getter(&self) -> bool {
        self.getter.is_some()
    }

    /// Token every long-running task is bound to.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fetch a stored job log through the process-wide getter.
    pub fn retrieve(&self, log_id: &str) -> LogResult<Vec<u8>> {
        match &self.getter {
            Some(getter) => getter.retrieve(log_id),
            None => Err(LogError::Precondition("no log getter is configured".into())),
        }
    }

    /// Stop the sweepers and close the service logger.
    pub async fn shutdown(&self) -> LogResult<()> {
        self.controller.shutdown().await;
        self.service_logger.close()
    }
}

fn build_service_logger(
    catalog: &BackendCatalog,
    policies: &[LoggerPolicy],
) -> LogResult<CompositeLogger> {
    let mut backends: Vec<Arc<dyn Backend>> = Vec::with_capacity(policies.len());
    for policy in policies {
        let mut opts = policy.logger_options();
        if catalog.is_backend(&policy.name, registry::FILE)
            || catalog.is_backend(&policy.name, registry::STD_OUTPUT)
        {
            set_option(&mut opts, "depth", SERVICE_LOGGER_DEPTH);
        }
        backends.push(catalog.get_logger(&policy.name, &opts)?);
    }
    CompositeLogger::new(backends)
}

/// Sweepers declared by both policies, in policy order.
pub fn build_sweepers(
    catalog: &BackendCatalog,
    config: &ServiceConfig,
) -> LogResult<Vec<Arc<dyn Sweeper>>> {
    let mut sweepers = Vec::new();
    for policy in config.loggers.iter().chain(config.job_loggers.iter()) {
        let Some(sweeper) = &policy.sweeper else {
            continue;
        };
        let mut opts = sweeper.sweeper_options();
        // A file sweeper cleans the directory its logger writes to by default.
        if catalog.is_backend(&policy.name, registry::FILE)
            && !opts.iter().any(|(k, _)| k == "work_dir")
        {
            if let Some(SettingValue::Str(dir)) = policy.settings.get("base_dir") {
                set_option(&mut opts, "work_dir", dir.as_str());
            }
        }
        sweepers.push(catalog.get_sweeper(&policy.name, &opts)?);
    }
    Ok(sweepers)
}

/// First job backend, by name, that can build a getter.
pub fn select_getter(catalog: &BackendCatalog, policies: &[LoggerPolicy]) -> Option<Arc<dyn Getter>> {
    let mut candidates: Vec<&LoggerPolicy> = policies
        .iter()
        .filter(|p| catalog.registry().has_getter(&p.name))
        .collect();
    candidates.sort_by_key(|p| registry::normalize(&p.name));

    for policy in candidates {
        match catalog.get_getter(&policy.name, &policy.logger_options()) {
            Ok(getter) => {
                info!(backend = %policy.name, "Using job log getter");
                return Some(getter);
            }
            Err(e) => warn!(backend = %policy.name, error = %e, "Cannot build log getter"),
        }
    }
    None
}
