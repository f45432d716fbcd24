//! SQLite persistence adapters.

pub mod job_queue_repository;
pub mod manager;
pub mod metrics_repository;
pub mod work_unit_repository;

pub use job_queue_repository::SqliteJobQueue;
pub use manager::DbManager;
pub use metrics_repository::{MetricsTotals, SqliteMetricsSink};
pub use work_unit_repository::SqliteWorkUnitStore;

/// Current unix timestamp in seconds, as persisted in every table.
pub(crate) fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}
