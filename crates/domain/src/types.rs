//! Core records moved between the queue, the driver, and the adapters.
//!
//! All timestamps are unix epoch seconds; identifiers are the SQLite rowids
//! assigned on insert.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

/// Lifecycle of a work unit (a topic waiting to become an article).
///
/// Transitions: `Pending → Assigned → Completed | Failed`. An `Assigned`
/// unit whose process died is swept back to `Pending` on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkUnitStatus {
    Pending,
    Assigned,
    Completed,
    Failed,
}

impl WorkUnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkUnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkUnitStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "assigned" => Ok(Self::Assigned),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(PipelineError::Internal(format!("unknown work unit status: {other}"))),
        }
    }
}

/// A topic claimed from the work pool, carried through one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
    pub id: i64,
    pub topic: String,
    pub status: WorkUnitStatus,
    pub added_at: i64,
    pub assigned_at: Option<i64>,
    pub completed_at: Option<i64>,
    /// Failure detail recorded when `status` is `Failed`.
    pub error: Option<String>,
}

impl WorkUnit {
    /// True once the unit reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, WorkUnitStatus::Completed | WorkUnitStatus::Failed)
    }
}

/// Lifecycle of a queued job.
///
/// Transitions: `Pending → InProgress → Completed | Failed`. `InProgress`
/// jobs older than the staleness window are reset to `Pending` on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(PipelineError::Internal(format!("unknown job status: {other}"))),
        }
    }
}

/// A durable unit of deferred work, persisted across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: i64,
    /// Discriminator routing the job to a handler (e.g. `"pipeline_run"`).
    pub kind: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    /// JSON result recorded on success.
    pub result: Option<serde_json::Value>,
    /// Failure detail recorded when `status` is `Failed`.
    pub error: Option<String>,
}

/// Terminal outcome reported when completing a dequeued job.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Success(serde_json::Value),
    Failure(String),
}

/// One product referenced by a generated article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub price: String,
    pub rating: f64,
    pub asin: String,
    pub url: String,
}

/// Raw generator output before enrichment and assembly.
#[derive(Debug, Clone)]
pub struct GeneratedText {
    pub body: String,
    pub tokens_used: u64,
}

/// A fully assembled artifact ready for publication.
#[derive(Debug, Clone)]
pub struct Article {
    pub filename: String,
    pub body: String,
    /// True when the body is fallback content produced after generation
    /// exhausted its retries.
    pub degraded: bool,
    pub tokens_used: u64,
}

/// Result of a single end-to-end pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The work pool had no pending unit.
    NoWork,
    /// An artifact was published; `degraded` marks fallback content.
    Completed { degraded: bool, filename: String },
    /// The run aborted before an artifact could be published.
    Failed { reason: String },
}
