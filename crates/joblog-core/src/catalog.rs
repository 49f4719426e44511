//! Registry lookups plus the singleton cache.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::{Options, ServiceConfig};
use crate::error::{LogError, LogResult};
use crate::factory::FactoryContext;
use crate::getter::Getter;
use crate::logger::Backend;
use crate::registry::{self, BackendDescriptor, Registry};
use crate::rowstore::{RedbRowStore, RowStore, RowStoreReadiness};
use crate::sweeper::Sweeper;

/// Builds backends, sweepers and getters by name.
///
/// Singleton backends are built on first request and shared afterwards;
/// every other request gets a fresh instance.
pub struct BackendCatalog {
    registry: Registry,
    context: FactoryContext,
    singletons: Mutex<HashMap<String, Arc<dyn Backend>>>,
}

impl BackendCatalog {
    pub fn new(registry: Registry, context: FactoryContext) -> Self {
        Self {
            registry,
            context,
            singletons: Mutex::new(HashMap::new()),
        }
    }

    /// Catalog for `config`, opening its database if one is configured.
    ///
    /// The store is marked ready once open, so row-store sweepers built
    /// from this catalog run without waiting.
    pub fn from_config(registry: Registry, config: &ServiceConfig) -> LogResult<Self> {
        let context = match &config.database {
            Some(db) => {
                let store: Arc<dyn RowStore> = Arc::new(RedbRowStore::new(&db.path)?);
                FactoryContext::with_row_store(store, Arc::new(RowStoreReadiness::ready()))
            }
            None => FactoryContext::without_row_store(),
        };
        Ok(Self::new(registry, context))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn context(&self) -> &FactoryContext {
        &self.context
    }

    fn descriptor(&self, name: &str) -> LogResult<&BackendDescriptor> {
        self.registry
            .descriptor(name)
            .ok_or_else(|| LogError::UnknownBackend(name.to_string()))
    }

    /// Logger for `name`, built from `opts` unless a singleton is cached.
    pub fn get_logger(&self, name: &str, opts: &Options) -> LogResult<Arc<dyn Backend>> {
        let descriptor = self.descriptor(name)?;
        let factory = descriptor.capabilities.logger();

        if !descriptor.singleton {
            return factory(&self.context, opts);
        }

        // Held across construction so a singleton is built at most once.
        let mut singletons = self.singletons.lock();
        if let Some(existing) = singletons.get(&descriptor.name) {
            return Ok(existing.clone());
        }
        let backend = factory(&self.context, opts)?;
        debug!(backend = %descriptor.name, "Cached singleton logger");
        singletons.insert(descriptor.name.clone(), backend.clone());
        Ok(backend)
    }

    pub fn get_sweeper(&self, name: &str, opts: &Options) -> LogResult<Arc<dyn Sweeper>> {
        let descriptor = self.descriptor(name)?;
        let factory = descriptor.capabilities.sweeper().ok_or_else(|| {
            LogError::InvalidConfig(format!("backend {} has no sweeper", descriptor.name))
        })?;
        factory(&self.context, opts)
    }

    pub fn get_getter(&self, name: &str, opts: &Options) -> LogResult<Arc<dyn Getter>> {
        let descriptor = self.descriptor(name)?;
        let factory = descriptor.capabilities.getter().ok_or_else(|| {
            LogError::InvalidConfig(format!("backend {} has no getter", descriptor.name))
        })?;
        factory(&self.context, opts)
    }

    /// Whether `name` resolves to the given builtin backend.
    pub fn is_backend(&self, name: &str, builtin: &str) -> bool {
        registry::normalize(name) == builtin
    }
}
