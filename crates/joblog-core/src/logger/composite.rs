//! Fan-out logger over an ordered list of backends.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::record::Record;
use super::{Backend, Closable};
use crate::error::{BackendFailure, LogError, LogResult};
use crate::level::LogLevel;

/// Delivers every record to each backend, in construction order.
///
/// The backend list is fixed once built. A backend that panics while
/// writing does not stop the record from reaching the rest of the list.
pub struct CompositeLogger {
    backends: Vec<Arc<dyn Backend>>,
}

impl CompositeLogger {
    /// Build a composite over a non-empty list of backends.
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> LogResult<Self> {
        if backends.is_empty() {
            return Err(LogError::InvalidArgument(
                "composite logger needs at least one backend".into(),
            ));
        }
        Ok(Self { backends })
    }

    pub fn backends(&self) -> &[Arc<dyn Backend>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for CompositeLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.backends.iter().map(|b| b.name()))
            .finish()
    }
}

impl Backend for CompositeLogger {
    fn name(&self) -> &str {
        "COMPOSITE"
    }

    /// The most permissive level among the backends.
    fn level(&self) -> LogLevel {
        self.backends
            .iter()
            .map(|b| b.level())
            .min()
            .unwrap_or_default()
    }

    fn log(&self, record: &Record<'_>) {
        for backend in &self.backends {
            // Panic output still goes through the hook; the record moves on.
            let _ = panic::catch_unwind(AssertUnwindSafe(|| backend.log(record)));
        }
    }

    fn closable(&self) -> Option<&dyn Closable> {
        Some(self)
    }
}

impl Closable for CompositeLogger {
    /// Close every closable backend and report all failures together.
    fn close(&self) -> LogResult<()> {
        let mut failures = Vec::new();

        for backend in &self.backends {
            let Some(closable) = backend.closable() else {
                continue;
            };
            let result = panic::catch_unwind(AssertUnwindSafe(|| closable.close()))
                .unwrap_or_else(|_| Err(LogError::Task("backend panicked while closing".into())));
            if let Err(error) = result {
                failures.push(BackendFailure {
                    backend: backend.name().to_string(),
                    error,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LogError::Aggregate(failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::testing::RecordingBackend;
    use crate::logger::LoggerExt;

    struct PanickingBackend;

    impl Backend for PanickingBackend {
        fn name(&self) -> &str {
            "PANIC"
        }

        fn level(&self) -> LogLevel {
            LogLevel::Debug
        }

        fn log(&self, _record: &Record<'_>) {
            panic!("backend exploded");
        }
    }

    #[test]
    fn test_empty_composite_rejected() {
        assert!(matches!(
            CompositeLogger::new(Vec::new()),
            Err(LogError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_every_backend_sees_each_record_once() {
        let a = Arc::new(RecordingBackend::new("A"));
        let b = Arc::new(RecordingBackend::new("B"));
        let logger = CompositeLogger::new(vec![a.clone() as Arc<dyn Backend>, b.clone()]).unwrap();

        logger.info("hello");
        logger.warningf(format_args!("{} apples", 3));

        assert_eq!(a.messages(), vec!["hello", "3 apples"]);
        assert_eq!(b.messages(), vec!["hello", "3 apples"]);
    }

    #[test]
    fn test_panicking_backend_is_isolated() {
        let before = Arc::new(RecordingBackend::new("BEFORE"));
        let after = Arc::new(RecordingBackend::new("AFTER"));
        let logger = CompositeLogger::new(vec![
            before.clone() as Arc<dyn Backend>,
            Arc::new(PanickingBackend),
            after.clone(),
        ])
        .unwrap();

        logger.error("still delivered");

        assert_eq!(before.messages(), vec!["still delivered"]);
        assert_eq!(after.messages(), vec!["still delivered"]);
    }

    #[test]
    fn test_level_is_most_permissive_backend() {
        let mut quiet = RecordingBackend::new("QUIET");
        quiet.level = LogLevel::Error;
        let mut chatty = RecordingBackend::new("CHATTY");
        chatty.level = LogLevel::Info;
        let logger = CompositeLogger::new(vec![Arc::new(quiet) as Arc<dyn Backend>, Arc::new(chatty)]).unwrap();

        assert_eq!(logger.level(), LogLevel::Info);
    }

    #[test]
    fn test_close_invokes_each_closable_once() {
        let a = Arc::new(RecordingBackend::new("A"));
        let mut plain = RecordingBackend::new("PLAIN");
        plain.closable = false;
        let plain = Arc::new(plain);
        let logger = CompositeLogger::new(vec![a.clone() as Arc<dyn Backend>, plain.clone()]).unwrap();

        logger.close().unwrap();

        assert_eq!(a.close_count(), 1);
        assert_eq!(plain.close_count(), 0);
    }

    #[test]
    fn test_close_aggregates_failures() {
        let mut bad = RecordingBackend::new("BAD");
        bad.fail_close = true;
        let bad = Arc::new(bad);
        let good = Arc::new(RecordingBackend::new("GOOD"));
        let mut worse = RecordingBackend::new("WORSE");
        worse.fail_close = true;
        let worse = Arc::new(worse);

        let logger = CompositeLogger::new(vec![
            bad.clone() as Arc<dyn Backend>,
            good.clone(),
            worse.clone(),
        ]).unwrap();
        let err = logger.close().unwrap_err();

        match err {
            LogError::Aggregate(failures) => {
                let names: Vec<_> = failures.iter().map(|f| f.backend.as_str()).collect();
                assert_eq!(names, vec!["BAD", "WORSE"]);
            }
            other => panic!("expected aggregate error, got {other:?}"),
        }
        assert_eq!(good.close_count(), 1);
        assert_eq!(bad.close_count(), 1);
        assert_eq!(worse.close_count(), 1);
    }
}
