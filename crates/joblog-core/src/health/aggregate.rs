//! Parallel health aggregation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use super::Checker;
use crate::error::HealthError;

/// Default bound on how long one aggregation may take.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub name: String,
    pub status: HealthState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of checking every component, sorted by component name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallStatus {
    pub status: HealthState,
    pub components: Vec<ComponentStatus>,
}

impl OverallStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

/// Runs a named set of checkers in parallel.
pub struct HealthAggregator {
    checkers: BTreeMap<String, Arc<dyn Checker>>,
    timeout: Duration,
}

impl HealthAggregator {
    pub fn new() -> Self {
        Self {
            checkers: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add or replace the checker for `name`.
    pub fn add(&mut self, name: impl Into<String>, checker: Arc<dyn Checker>) {
        self.checkers.insert(name.into(), checker);
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }

    /// Check every component. Never fails as a whole; a component that
    /// does not answer within the timeout is reported unhealthy.
    pub async fn check_all(&self) -> OverallStatus {
        let checks = self.checkers.iter().map(|(name, checker)| async move {
            let result = match tokio::time::timeout(self.timeout, checker.check()).await {
                Ok(result) => result,
                Err(_) => Err(HealthError::Timeout),
            };
            match result {
                Ok(()) => ComponentStatus {
                    name: name.clone(),
                    status: HealthState::Healthy,
                    error: None,
                },
                Err(e) => ComponentStatus {
                    name: name.clone(),
                    status: HealthState::Unhealthy,
                    error: Some(e.to_string()),
                },
            }
        });

        // BTreeMap iteration keeps the components sorted by name.
        let components = join_all(checks).await;
        let status = if components.iter().all(|c| c.status == HealthState::Healthy) {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };
        OverallStatus { status, components }
    }
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{probe_fn, ProbeChecker};

    fn checker(result: Result<(), &'static str>) -> Arc<dyn Checker> {
        Arc::new(ProbeChecker::new(probe_fn(move || async move {
            result.map_err(|e| HealthError::Failed(e.to_string()))
        })))
    }

    #[tokio::test]
    async fn test_all_healthy() {
        let mut aggregator = HealthAggregator::new();
        aggregator.add("registry", checker(Ok(())));
        aggregator.add("database", checker(Ok(())));

        let status = aggregator.check_all().await;
        assert!(status.is_healthy());
        let names: Vec<_> = status.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["database", "registry"]);
    }

    #[tokio::test]
    async fn test_one_failure_makes_overall_unhealthy() {
        let mut aggregator = HealthAggregator::new();
        aggregator.add("core", checker(Ok(())));
        aggregator.add("redis", checker(Err("connection refused")));

        let status = aggregator.check_all().await;
        assert_eq!(status.status, HealthState::Unhealthy);
        assert_eq!(status.components[1].error.as_deref(), Some("connection refused"));
        assert_eq!(status.components[0].error, None);
    }

    #[tokio::test]
    async fn test_empty_is_healthy() {
        assert!(HealthAggregator::default().check_all().await.is_healthy());
    }

    #[test]
    fn test_json_shape() {
        let status = OverallStatus {
            status: HealthState::Unhealthy,
            components: vec![
                ComponentStatus {
                    name: "a".into(),
                    status: HealthState::Healthy,
                    error: None,
                },
                ComponentStatus {
                    name: "b".into(),
                    status: HealthState::Unhealthy,
                    error: Some("failed to check the health status: timeout".into()),
                },
            ],
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "unhealthy",
                "components": [
                    {"name": "a", "status": "healthy"},
                    {"name": "b", "status": "unhealthy", "error": "failed to check the health status: timeout"}
                ]
            })
        );
    }
}
