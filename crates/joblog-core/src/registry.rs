//! Backend registry.
//!
//! Maps a backend name to its factories. What a backend can do beyond
//! logging is carried by the [`Capabilities`] variant, so capability
//! queries are a match rather than a set of optional fields.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::Options;
use crate::error::{LogError, LogResult};
use crate::factory::{self, FactoryContext};
use crate::getter::Getter;
use crate::logger::Backend;
use crate::sweeper::Sweeper;

pub const FILE: &str = "FILE";
pub const STD_OUTPUT: &str = "STD_OUTPUT";
pub const DB: &str = "DB";

pub type LoggerFactory = fn(&FactoryContext, &Options) -> LogResult<Arc<dyn Backend>>;
pub type SweeperFactory = fn(&FactoryContext, &Options) -> LogResult<Arc<dyn Sweeper>>;
pub type GetterFactory = fn(&FactoryContext, &Options) -> LogResult<Arc<dyn Getter>>;

/// What a backend provides besides its logger.
#[derive(Clone, Copy)]
pub enum Capabilities {
    LoggerOnly {
        logger: LoggerFactory,
    },
    LoggerAndSweeper {
        logger: LoggerFactory,
        sweeper: SweeperFactory,
    },
    LoggerAndGetter {
        logger: LoggerFactory,
        getter: GetterFactory,
    },
    Full {
        logger: LoggerFactory,
        sweeper: SweeperFactory,
        getter: GetterFactory,
    },
}

impl Capabilities {
    pub fn logger(&self) -> LoggerFactory {
        match *self {
            Capabilities::LoggerOnly { logger }
            | Capabilities::LoggerAndSweeper { logger, .. }
            | Capabilities::LoggerAndGetter { logger, .. }
            | Capabilities::Full { logger, .. } => logger,
        }
    }

    pub fn sweeper(&self) -> Option<SweeperFactory> {
        match *self {
            Capabilities::LoggerAndSweeper { sweeper, .. } | Capabilities::Full { sweeper, .. } => {
                Some(sweeper)
            }
            Capabilities::LoggerOnly { .. } | Capabilities::LoggerAndGetter { .. } => None,
        }
    }

    pub fn getter(&self) -> Option<GetterFactory> {
        match *self {
            Capabilities::LoggerAndGetter { getter, .. } | Capabilities::Full { getter, .. } => {
                Some(getter)
            }
            Capabilities::LoggerOnly { .. } | Capabilities::LoggerAndSweeper { .. } => None,
        }
    }
}

/// Registration record of one backend.
#[derive(Clone)]
pub struct BackendDescriptor {
    pub name: String,
    /// One shared instance per process instead of one per request
    pub singleton: bool,
    pub capabilities: Capabilities,
}

impl BackendDescriptor {
    pub fn new(name: impl Into<String>, singleton: bool, capabilities: Capabilities) -> Self {
        Self {
            name: name.into(),
            singleton,
            capabilities,
        }
    }
}

impl std::fmt::Debug for BackendDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendDescriptor")
            .field("name", &self.name)
            .field("singleton", &self.singleton)
            .field("sweeper", &self.capabilities.sweeper().is_some())
            .field("getter", &self.capabilities.getter().is_some())
            .finish()
    }
}

/// One row of [`Registry::describe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendSummary {
    pub name: String,
    pub singleton: bool,
    pub sweeper: bool,
    pub getter: bool,
}

/// Name-keyed table of backend descriptors.
///
/// Names are matched case-insensitively and stored upper-case.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<String, BackendDescriptor>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the FILE, STD_OUTPUT and DB backends.
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        for descriptor in [
            BackendDescriptor::new(
                FILE,
                false,
                Capabilities::Full {
                    logger: factory::file_logger,
                    sweeper: factory::file_sweeper,
                    getter: factory::file_getter,
                },
            ),
            BackendDescriptor::new(
                STD_OUTPUT,
                true,
                Capabilities::LoggerOnly {
                    logger: factory::std_logger,
                },
            ),
            BackendDescriptor::new(
                DB,
                false,
                Capabilities::Full {
                    logger: factory::db_logger,
                    sweeper: factory::db_sweeper,
                    getter: factory::db_getter,
                },
            ),
        ] {
            entries.insert(descriptor.name.clone(), descriptor);
        }
        Self { entries }
    }

    /// Add a backend. Registering a name twice is an error.
    pub fn register(&mut self, mut descriptor: BackendDescriptor) -> LogResult<()> {
        let key = normalize(&descriptor.name);
        if self.entries.contains_key(&key) {
            return Err(LogError::InvalidArgument(format!(
                "backend {} is already registered",
                descriptor.name
            )));
        }
        descriptor.name = key.clone();
        self.entries.insert(key, descriptor);
        Ok(())
    }

    pub fn descriptor(&self, name: &str) -> Option<&BackendDescriptor> {
        self.entries.get(&normalize(name))
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.descriptor(name).is_some()
    }

    pub fn has_sweeper(&self, name: &str) -> bool {
        self.descriptor(name)
            .is_some_and(|d| d.capabilities.sweeper().is_some())
    }

    pub fn has_getter(&self, name: &str) -> bool {
        self.descriptor(name)
            .is_some_and(|d| d.capabilities.getter().is_some())
    }

    /// Registered names in lexicographic order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Capability table in name order.
    pub fn describe(&self) -> Vec<BackendSummary> {
        self.entries
            .values()
            .map(|d| BackendSummary {
                name: d.name.clone(),
                singleton: d.singleton,
                sweeper: d.capabilities.sweeper().is_some(),
                getter: d.capabilities.getter().is_some(),
            })
            .collect()
    }
}

/// Canonical form of a backend name.
pub fn normalize(name: &str) -> String {
    name.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_capabilities() {
        let registry = Registry::builtin();

        assert!(registry.is_known(FILE));
        assert!(registry.has_sweeper(FILE));
        assert!(registry.has_getter(FILE));

        assert!(registry.is_known(STD_OUTPUT));
        assert!(!registry.has_sweeper(STD_OUTPUT));
        assert!(!registry.has_getter(STD_OUTPUT));
        assert!(registry.descriptor(STD_OUTPUT).unwrap().singleton);

        assert!(registry.has_sweeper(DB));
        assert!(registry.has_getter(DB));
        assert!(!registry.descriptor(DB).unwrap().singleton);

        assert!(!registry.is_known("SYSLOG"));
        assert!(!registry.has_getter("SYSLOG"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = Registry::builtin();
        assert!(registry.is_known("file"));
        assert!(registry.has_getter(" Db "));
        assert_eq!(registry.descriptor("std_output").unwrap().name, STD_OUTPUT);
    }

    #[test]
    fn test_names_are_sorted() {
        let registry = Registry::builtin();
        assert_eq!(registry.names(), vec![DB, FILE, STD_OUTPUT]);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = Registry::builtin();
        let descriptor = BackendDescriptor::new(
            "file",
            false,
            Capabilities::LoggerOnly {
                logger: factory::std_logger,
            },
        );
        assert!(matches!(
            registry.register(descriptor),
            Err(LogError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_register_custom_backend() {
        let mut registry = Registry::new();
        registry
            .register(BackendDescriptor::new(
                "console",
                true,
                Capabilities::LoggerAndGetter {
                    logger: factory::std_logger,
                    getter: factory::file_getter,
                },
            ))
            .unwrap();

        assert_eq!(
            registry.describe(),
            vec![BackendSummary {
                name: "CONSOLE".into(),
                singleton: true,
                sweeper: false,
                getter: true,
            }]
        );
    }
}
