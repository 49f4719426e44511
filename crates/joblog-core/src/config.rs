//! Service configuration.
//!
//! ```yaml
//! loggers:
//!   - name: STD_OUTPUT
//!     level: INFO
//! job_loggers:
//!   - name: FILE
//!     level: DEBUG
//!     settings:
//!       base_dir: /var/log/jobs
//!     sweeper:
//!       duration: 14
//!       settings:
//!         work_dir: /var/log/jobs
//!   - name: DB
//!     level: INFO
//!     sweeper:
//!       duration: 30
//! database:
//!   path: /var/lib/joblog/logs.redb
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LogError, LogResult};
use crate::level::LogLevel;

/// A typed setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Int(i64),
    Str(String),
    /// Only produced programmatically; configuration files carry days as integers.
    #[serde(skip)]
    Duration(Duration),
    Map(BTreeMap<String, SettingValue>),
}

impl SettingValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(n) => Some(*n),
            SettingValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::Str(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::Str(s)
    }
}

impl From<i64> for SettingValue {
    fn from(n: i64) -> Self {
        SettingValue::Int(n)
    }
}

impl From<Duration> for SettingValue {
    fn from(d: Duration) -> Self {
        SettingValue::Duration(d)
    }
}

impl From<&Path> for SettingValue {
    fn from(p: &Path) -> Self {
        SettingValue::Str(p.display().to_string())
    }
}

/// Ordered `(field, value)` pairs for one backend. Lookup is by field name.
pub type Options = Vec<(String, SettingValue)>;

/// Build an [`Options`] list from literal pairs.
pub fn options<K, V, I>(pairs: I) -> Options
where
    K: Into<String>,
    V: Into<SettingValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Set `field` to `value`, replacing an existing entry in place.
pub fn set_option(opts: &mut Options, field: &str, value: impl Into<SettingValue>) {
    let value = value.into();
    match opts.iter_mut().find(|(k, _)| k == field) {
        Some(entry) => entry.1 = value,
        None => opts.push((field.to_string(), value)),
    }
}

/// One entry of a logger policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerPolicy {
    pub name: String,
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub settings: BTreeMap<String, SettingValue>,
    #[serde(default)]
    pub sweeper: Option<SweeperPolicy>,
}

impl LoggerPolicy {
    pub fn new(name: impl Into<String>, level: LogLevel) -> Self {
        Self {
            name: name.into(),
            level,
            settings: BTreeMap::new(),
            sweeper: None,
        }
    }

    pub fn with_setting(mut self, field: &str, value: impl Into<SettingValue>) -> Self {
        self.settings.insert(field.to_string(), value.into());
        self
    }

    pub fn with_sweeper(mut self, sweeper: SweeperPolicy) -> Self {
        self.sweeper = Some(sweeper);
        self
    }

    /// Logger options: the settings plus `level`.
    pub fn logger_options(&self) -> Options {
        let mut opts: Options = self
            .settings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        set_option(&mut opts, "level", self.level.as_str());
        opts
    }
}

/// Sweeper attached to a logger policy entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweeperPolicy {
    /// Retention in days; non-positive values mean one day.
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub settings: BTreeMap<String, SettingValue>,
}

impl SweeperPolicy {
    pub fn new(duration: i64) -> Self {
        Self {
            duration,
            settings: BTreeMap::new(),
        }
    }

    pub fn with_setting(mut self, field: &str, value: impl Into<SettingValue>) -> Self {
        self.settings.insert(field.to_string(), value.into());
        self
    }

    /// Sweeper options: the settings plus `duration`.
    pub fn sweeper_options(&self) -> Options {
        let mut opts: Options = self
            .settings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        set_option(&mut opts, "duration", self.duration);
        opts
    }
}

/// Location of the job log row store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// An HTTP endpoint watched by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthComponentConfig {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub timeout: u64,
    /// Seconds between probes
    #[serde(default = "default_probe_period")]
    pub period: u64,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_expected_status() -> u16 {
    200
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_probe_period() -> u64 {
    30
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default)]
    pub components: BTreeMap<String, HealthComponentConfig>,
    /// Aggregate timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Loggers of the long-running service
    #[serde(default)]
    pub loggers: Vec<LoggerPolicy>,
    /// Loggers instantiated per job
    #[serde(default)]
    pub job_loggers: Vec<LoggerPolicy>,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub health: HealthConfig,
    /// Properties copied into every job context
    #[serde(default)]
    pub job_properties: HashMap<String, serde_json::Value>,
}

impl ServiceConfig {
    /// Parse YAML text.
    pub fn from_yaml(raw: &str) -> LogResult<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Level names in `raw` that are not recognised and will read as WARNING.
    ///
    /// Each entry is reported as `<section>[<index>]: <level>`.
    pub fn unknown_levels(raw: &str) -> LogResult<Vec<String>> {
        let doc: serde_yaml::Value = serde_yaml::from_str(raw)?;
        let mut unknown = Vec::new();
        for section in ["loggers", "job_loggers"] {
            let Some(entries) = doc.get(section).and_then(|v| v.as_sequence()) else {
                continue;
            };
            for (i, entry) in entries.iter().enumerate() {
                if let Some(level) = entry.get("level").and_then(|v| v.as_str()) {
                    if !LogLevel::is_known(level) {
                        unknown.push(format!("{}[{}]: {}", section, i, level));
                    }
                }
            }
        }
        Ok(unknown)
    }

    /// Load a YAML file, resolving relative directories against its location.
    pub fn load(path: impl AsRef<Path>) -> LogResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LogError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_yaml(&raw)?;

        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.resolve_relative_paths(&base);
        Ok(config)
    }

    /// Make `base_dir`, `work_dir` and the database path absolute under `base`.
    pub fn resolve_relative_paths(&mut self, base: &Path) {
        for policy in self.loggers.iter_mut().chain(self.job_loggers.iter_mut()) {
            resolve_setting(&mut policy.settings, "base_dir", base);
            if let Some(sweeper) = policy.sweeper.as_mut() {
                resolve_setting(&mut sweeper.settings, "work_dir", base);
            }
        }
        if let Some(db) = self.database.as_mut() {
            if db.path.is_relative() {
                db.path = base.join(&db.path);
            }
        }
    }

    /// Structural checks: at least one service logger, every backend known.
    ///
    /// Unknown level names are not an error; they read as WARNING.
    pub fn validate(&self, registry: &crate::registry::Registry) -> LogResult<()> {
        if self.loggers.is_empty() {
            return Err(LogError::InvalidConfig(
                "at least one service logger must be configured".into(),
            ));
        }
        for policy in self.loggers.iter().chain(self.job_loggers.iter()) {
            if !registry.is_known(&policy.name) {
                return Err(LogError::UnknownBackend(policy.name.clone()));
            }
            if policy.sweeper.is_some() && !registry.has_sweeper(&policy.name) {
                return Err(LogError::InvalidConfig(format!(
                    "backend {} does not support sweeping",
                    policy.name
                )));
            }
        }
        Ok(())
    }
}

fn resolve_setting(settings: &mut BTreeMap<String, SettingValue>, field: &str, base: &Path) {
    if let Some(SettingValue::Str(dir)) = settings.get_mut(field) {
        let p = PathBuf::from(dir.as_str());
        if p.is_relative() {
            *dir = base.join(p).display().to_string();
        }
    }
}
