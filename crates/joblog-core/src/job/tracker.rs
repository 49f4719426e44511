//! Job state as seen through the external tracker.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LogError, LogResult};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum JobStatus {
    Pending,
    Running,
    Stopped,
    Error,
    Success,
    Scheduled,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Running => "Running",
            JobStatus::Stopped => "Stopped",
            JobStatus::Error => "Error",
            JobStatus::Success => "Success",
            JobStatus::Scheduled => "Scheduled",
        }
    }

    /// Whether the job will not run again.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            JobStatus::Stopped | JobStatus::Error | JobStatus::Success
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "stopped" => Ok(JobStatus::Stopped),
            "error" => Ok(JobStatus::Error),
            "success" => Ok(JobStatus::Success),
            "scheduled" => Ok(JobStatus::Scheduled),
            other => Err(LogError::InvalidArgument(format!("unknown job status: {}", other))),
        }
    }
}

/// How a job is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum JobKind {
    Generic,
    Scheduled,
    Periodic,
}

/// Identity of a tracked job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: String,
    pub kind: JobKind,
    pub name: String,
}

impl JobInfo {
    pub fn new(id: impl Into<String>, kind: JobKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
        }
    }
}

/// Reports and reads job state on behalf of a running job.
pub trait Tracker: Send + Sync {
    /// Most recently recorded state.
    fn status(&self) -> LogResult<JobStatus>;

    /// Attach a short progress line to the job.
    fn check_in(&self, message: &str) -> LogResult<()>;

    fn job(&self) -> &JobInfo;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Stopped,
            JobStatus::Error,
            JobStatus::Success,
            JobStatus::Scheduled,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert_eq!("STOPPED".parse::<JobStatus>().unwrap(), JobStatus::Stopped);
        assert!("Paused".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_final_states() {
        assert!(JobStatus::Success.is_final());
        assert!(JobStatus::Stopped.is_final());
        assert!(!JobStatus::Running.is_final());
        assert!(!JobStatus::Scheduled.is_final());
    }

    #[test]
    fn test_job_info_serialises() {
        let info = JobInfo::new("a1", JobKind::Periodic, "GARBAGE_COLLECTION");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["kind"], "Periodic");
        assert_eq!(json["id"], "a1");
    }
}
