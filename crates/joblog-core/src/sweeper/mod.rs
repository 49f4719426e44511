//! Retention sweepers.
//!
//! A [`Sweeper`] removes log material older than its retention period.
//! [`SweeperController`] runs a set of them on their own schedules.

pub mod controller;
pub mod db;
pub mod file;

pub use controller::{SweepFailure, SweepSummary, SweeperController};
pub use db::DbSweeper;
pub use file::FileSweeper;

use crate::error::LogResult;

/// Removes aged log material for one backend.
///
/// `sweep` blocks on I/O. Callers never run two sweeps of the same
/// sweeper at once.
pub trait Sweeper: Send + Sync {
    /// Remove expired material, returning how many items went.
    fn sweep(&self) -> LogResult<usize>;

    /// Retention period in days.
    fn duration(&self) -> i64;

    /// Runtime type name, used to tag failures.
    fn kind(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Normalise a retention period: non-positive values mean one day.
pub(crate) fn normalize_days(days: i64) -> i64 {
    days.max(1)
}
