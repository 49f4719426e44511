//! Property-based tests for levels and composite fan-out
//!
//! Uses proptest to check the level order and the exactly-once delivery
//! of the composite logger.

use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;

use joblog_core::logger::Record;
use joblog_core::{Backend, CompositeLogger, LogLevel, LoggerExt};

// ============================================================================
// Strategy Generators
// ============================================================================

fn level_strategy() -> impl Strategy<Value = LogLevel> {
    prop::sample::select(LogLevel::ALL.to_vec())
}

/// Level names with random casing
fn level_name_strategy() -> impl Strategy<Value = (LogLevel, String)> {
    (level_strategy(), prop::collection::vec(any::<bool>(), 7)).prop_map(|(level, upper)| {
        let name: String = level
            .as_str()
            .chars()
            .zip(upper.into_iter().cycle())
            .map(|(c, up)| if up { c } else { c.to_ascii_lowercase() })
            .collect();
        (level, name)
    })
}

struct Collecting {
    level: LogLevel,
    seen: Mutex<Vec<String>>,
}

impl Backend for Collecting {
    fn name(&self) -> &str {
        "COLLECT"
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn log(&self, record: &Record<'_>) {
        if self.level.allows(record.level) {
            self.seen.lock().push(record.message.to_string());
        }
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn prop_level_names_parse_case_insensitively((level, name) in level_name_strategy()) {
        prop_assert_eq!(LogLevel::parse(&name), level);
        prop_assert!(LogLevel::is_known(&name));
    }

    #[test]
    fn prop_unknown_names_default_to_warning(name in "[a-z]{1,12}") {
        prop_assume!(!LogLevel::is_known(&name));
        prop_assert_eq!(LogLevel::parse(&name), LogLevel::Warning);
    }

    #[test]
    fn prop_gate_matches_order(backend in level_strategy(), record in level_strategy()) {
        prop_assert_eq!(backend.allows(record), record >= backend);
    }

    #[test]
    fn prop_every_backend_sees_each_record_once(
        backends in 1usize..6,
        messages in prop::collection::vec("[a-z ]{0,20}", 0..20),
    ) {
        let sinks: Vec<Arc<Collecting>> = (0..backends)
            .map(|_| Arc::new(Collecting { level: LogLevel::Debug, seen: Mutex::new(Vec::new()) }))
            .collect();
        let logger = CompositeLogger::new(
            sinks.iter().map(|s| s.clone() as Arc<dyn Backend>).collect(),
        ).unwrap();

        for m in &messages {
            logger.info(m);
        }

        for sink in &sinks {
            prop_assert_eq!(&*sink.seen.lock(), &messages);
        }
    }
}
