//! SQLite-backed implementation of the durable job queue port.
//!
//! `dequeue` is a single immediate transaction (select oldest pending, then
//! update to in_progress) so storage-level atomicity substitutes for an
//! in-process lock: no two consumers can claim the same job. Durability
//! failures are never hidden from the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use draftpress_core::JobQueue;
use draftpress_domain::{JobOutcome, JobStatus, PipelineError, QueuedJob, Result};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use tokio::task;
use tracing::debug;

use super::manager::DbManager;
use super::now_epoch;
use crate::errors::{map_join_error, map_sql_error};

const SELECT_COLUMNS: &str =
    "id, kind, payload, status, created_at, started_at, completed_at, result, error
     FROM job_queue";

/// SQLite-backed durable job queue.
pub struct SqliteJobQueue {
    db: Arc<DbManager>,
}

impl SqliteJobQueue {
    /// Construct a queue backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

fn map_job(row: &Row<'_>) -> rusqlite::Result<QueuedJob> {
    let status: String = row.get("status")?;
    let status = status.parse().map_err(|err: PipelineError| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err))
    })?;

    let payload: String = row.get("payload")?;
    let payload = serde_json::from_str(&payload).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(err))
    })?;

    let result: Option<String> = row.get("result")?;
    let result = match result {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(err))
        })?),
        None => None,
    };

    Ok(QueuedJob {
        id: row.get("id")?,
        kind: row.get("kind")?,
        payload,
        status,
        created_at: row.get("created_at")?,
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
        result,
        error: row.get("error")?,
    })
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, kind: &str, payload: serde_json::Value) -> Result<i64> {
        let db = Arc::clone(&self.db);
        let kind = kind.to_string();
        let payload = payload.to_string();

        task::spawn_blocking(move || -> Result<i64> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO job_queue (kind, payload, status, created_at)
                 VALUES (?1, ?2, 'pending', ?3)",
                params![kind, payload, now_epoch()],
            )
            .map_err(map_sql_error)?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn dequeue(&self) -> Result<Option<QueuedJob>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Option<QueuedJob>> {
            let mut conn = db.get_connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            let job = tx
                .query_row(
                    &format!(
                        "SELECT {SELECT_COLUMNS}
                         WHERE status = 'pending' ORDER BY created_at, id LIMIT 1"
                    ),
                    params![],
                    map_job,
                )
                .optional()
                .map_err(map_sql_error)?;

            let Some(mut job) = job else {
                return Ok(None);
            };

            let started_at = now_epoch();
            tx.execute(
                "UPDATE job_queue SET status = 'in_progress', started_at = ?1 WHERE id = ?2",
                params![started_at, job.id],
            )
            .map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;

            job.status = JobStatus::InProgress;
            job.started_at = Some(started_at);
            Ok(Some(job))
        })
        .await
        .map_err(map_join_error)?
    }

    async fn complete(&self, job_id: i64, outcome: JobOutcome) -> Result<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let changed = match &outcome {
                JobOutcome::Success(result) => conn
                    .execute(
                        "UPDATE job_queue
                         SET status = 'completed', result = ?1, completed_at = ?2
                         WHERE id = ?3 AND status = 'in_progress'",
                        params![result.to_string(), now_epoch(), job_id],
                    )
                    .map_err(map_sql_error)?,
                JobOutcome::Failure(error) => conn
                    .execute(
                        "UPDATE job_queue
                         SET status = 'failed', error = ?1, completed_at = ?2
                         WHERE id = ?3 AND status = 'in_progress'",
                        params![error, now_epoch(), job_id],
                    )
                    .map_err(map_sql_error)?,
            };

            // Completing a job that is not in progress is an error, never a
            // silent overwrite of a terminal state.
            if changed == 0 {
                return Err(PipelineError::NotFound(format!("job {job_id} is not in progress")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn reset_stale_jobs(&self, timeout: Duration) -> Result<usize> {
        let db = Arc::clone(&self.db);
        let cutoff = now_epoch() - timeout.as_secs() as i64;

        task::spawn_blocking(move || -> Result<usize> {
            let conn = db.get_connection()?;
            let reset = conn
                .execute(
                    "UPDATE job_queue
                     SET status = 'pending', started_at = NULL
                     WHERE status = 'in_progress' AND started_at <= ?1",
                    params![cutoff],
                )
                .map_err(map_sql_error)?;
            if reset > 0 {
                debug!(reset, "reset stale jobs");
            }
            Ok(reset)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn pending_count(&self) -> Result<u64> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<u64> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT COUNT(*) FROM job_queue WHERE status = 'pending'",
                params![],
                |row| row.get(0),
            )
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}
