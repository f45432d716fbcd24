//! SQLite-backed implementation of the work-unit store port.
//!
//! The claim is a single immediate transaction (select oldest pending, then
//! update to assigned) so two concurrent claimers can never take the same
//! unit. Every transition leaves an audit-log row; units are never deleted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use draftpress_core::WorkUnitStore;
use draftpress_domain::{PipelineError, Result, WorkUnit, WorkUnitStatus};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tokio::task;
use tracing::debug;

use super::manager::DbManager;
use super::now_epoch;
use crate::errors::{map_join_error, map_sql_error};

const SELECT_COLUMNS: &str =
    "id, topic, status, added_at, assigned_at, completed_at, error FROM work_units";

/// SQLite-backed work-unit repository.
pub struct SqliteWorkUnitStore {
    db: Arc<DbManager>,
}

impl SqliteWorkUnitStore {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn audit(conn: &Connection, action: &str, details: &str, level: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO audit_log (created_at, module, action, details, level)
             VALUES (?1, 'work_units', ?2, ?3, ?4)",
            params![now_epoch(), action, details, level],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    fn update_status(
        conn: &Connection,
        id: i64,
        status: WorkUnitStatus,
        error: Option<&str>,
    ) -> Result<()> {
        // Only an assigned unit can reach a terminal state; a late writer
        // racing a reaper-reset unit must not flip a state someone else
        // already finalized.
        let changed = conn
            .execute(
                "UPDATE work_units
                 SET status = ?1, completed_at = ?2, error = ?3
                 WHERE id = ?4 AND status = 'assigned'",
                params![status.as_str(), now_epoch(), error, id],
            )
            .map_err(map_sql_error)?;
        if changed == 0 {
            return Err(PipelineError::NotFound(format!("work unit {id} is not assigned")));
        }
        let level = if error.is_some() { "error" } else { "info" };
        Self::audit(
            conn,
            &format!("mark_{status}"),
            &format!("id={id} {}", error.unwrap_or("")),
            level,
        )
    }
}

fn map_work_unit(row: &Row<'_>) -> rusqlite::Result<WorkUnit> {
    let status: String = row.get("status")?;
    let status = status
        .parse()
        .map_err(|err: PipelineError| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(err))
        })?;
    Ok(WorkUnit {
        id: row.get("id")?,
        topic: row.get("topic")?,
        status,
        added_at: row.get("added_at")?,
        assigned_at: row.get("assigned_at")?,
        completed_at: row.get("completed_at")?,
        error: row.get("error")?,
    })
}

#[async_trait]
impl WorkUnitStore for SqliteWorkUnitStore {
    async fn add(&self, topic: &str) -> Result<i64> {
        let db = Arc::clone(&self.db);
        let topic = topic.to_string();

        task::spawn_blocking(move || -> Result<i64> {
            let conn = db.get_connection()?;
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO work_units (topic, status, added_at)
                     VALUES (?1, 'pending', ?2)",
                    params![topic, now_epoch()],
                )
                .map_err(map_sql_error)?;

            if inserted > 0 {
                let id = conn.last_insert_rowid();
                Self::audit(&conn, "seed_topic", &format!("id={id} topic={topic}"), "info")?;
                return Ok(id);
            }

            // Duplicate topic: hand back the existing row's id.
            conn.query_row(
                "SELECT id FROM work_units WHERE topic = ?1",
                params![topic],
                |row| row.get(0),
            )
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn claim_next(&self) -> Result<Option<WorkUnit>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> Result<Option<WorkUnit>> {
            let mut conn = db.get_connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            let unit = tx
                .query_row(
                    &format!(
                        "SELECT {SELECT_COLUMNS}
                         WHERE status = 'pending' ORDER BY added_at, id LIMIT 1"
                    ),
                    params![],
                    map_work_unit,
                )
                .optional()
                .map_err(map_sql_error)?;

            let Some(mut unit) = unit else {
                return Ok(None);
            };

            let assigned_at = now_epoch();
            tx.execute(
                "UPDATE work_units SET status = 'assigned', assigned_at = ?1 WHERE id = ?2",
                params![assigned_at, unit.id],
            )
            .map_err(map_sql_error)?;
            Self::audit(&tx, "claim", &format!("id={} topic={}", unit.id, unit.topic), "info")?;
            tx.commit().map_err(map_sql_error)?;

            unit.status = WorkUnitStatus::Assigned;
            unit.assigned_at = Some(assigned_at);
            Ok(Some(unit))
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_completed(&self, id: i64) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            Self::update_status(&conn, id, WorkUnitStatus::Completed, None)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_failed(&self, id: i64, reason: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let reason = reason.to_string();
        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            Self::update_status(&conn, id, WorkUnitStatus::Failed, Some(&reason))
        })
        .await
        .map_err(map_join_error)?
    }

    async fn reset_stale(&self, timeout: Duration) -> Result<usize> {
        let db = Arc::clone(&self.db);
        let cutoff = now_epoch() - timeout.as_secs() as i64;

        task::spawn_blocking(move || -> Result<usize> {
            let conn = db.get_connection()?;
            let reset = conn
                .execute(
                    "UPDATE work_units
                     SET status = 'pending', assigned_at = NULL
                     WHERE status = 'assigned' AND assigned_at <= ?1",
                    params![cutoff],
                )
                .map_err(map_sql_error)?;
            if reset > 0 {
                debug!(reset, "reset stale work units");
                Self::audit(&conn, "reset_stale", &format!("count={reset}"), "info")?;
            }
            Ok(reset)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get(&self, id: i64) -> Result<Option<WorkUnit>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<Option<WorkUnit>> {
            let conn = db.get_connection()?;
            conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                map_work_unit,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store() -> (SqliteWorkUnitStore, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager =
            DbManager::new(temp_dir.path().join("test.db"), 4).expect("manager created");
        manager.run_migrations().expect("migrations run");
        (SqliteWorkUnitStore::new(Arc::new(manager)), temp_dir)
    }

    #[tokio::test]
    async fn add_then_claim_returns_assigned_unit() {
        let (store, _dir) = store();
        let id = store.add("standing desks").await.unwrap();

        let unit = store.claim_next().await.unwrap().expect("unit claimed");
        assert_eq!(unit.id, id);
        assert_eq!(unit.status, WorkUnitStatus::Assigned);
        assert!(unit.assigned_at.is_some());

        // Nothing else is pending.
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_topic_returns_existing_id() {
        let (store, _dir) = store();
        let first = store.add("standing desks").await.unwrap();
        let second = store.add("standing desks").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn claims_oldest_pending_first() {
        let (store, _dir) = store();
        let first = store.add("topic one").await.unwrap();
        let second = store.add("topic two").await.unwrap();

        assert_eq!(store.claim_next().await.unwrap().unwrap().id, first);
        assert_eq!(store.claim_next().await.unwrap().unwrap().id, second);
    }

    #[tokio::test]
    async fn completed_and_failed_transitions_are_persisted() {
        let (store, _dir) = store();
        let id = store.add("topic").await.unwrap();
        store.claim_next().await.unwrap();

        store.mark_completed(id).await.unwrap();
        let unit = store.get(id).await.unwrap().unwrap();
        assert_eq!(unit.status, WorkUnitStatus::Completed);
        assert!(unit.completed_at.is_some());

        let other = store.add("other topic").await.unwrap();
        store.claim_next().await.unwrap();
        store.mark_failed(other, "no products").await.unwrap();
        let unit = store.get(other).await.unwrap().unwrap();
        assert_eq!(unit.status, WorkUnitStatus::Failed);
        assert_eq!(unit.error.as_deref(), Some("no products"));
    }

    #[tokio::test]
    async fn terminal_state_cannot_be_overwritten() {
        let (store, _dir) = store();
        let id = store.add("topic").await.unwrap();
        store.claim_next().await.unwrap();
        store.mark_completed(id).await.unwrap();

        // A worker that lost its claim reports its failure too late.
        assert!(matches!(
            store.mark_failed(id, "late failure").await,
            Err(PipelineError::NotFound(_))
        ));
        let unit = store.get(id).await.unwrap().unwrap();
        assert_eq!(unit.status, WorkUnitStatus::Completed);

        // Same in the other direction: a completed unit stays completed.
        assert!(matches!(store.mark_completed(id).await, Err(PipelineError::NotFound(_))));
    }

    #[tokio::test]
    async fn marking_an_unclaimed_unit_is_an_error() {
        let (store, _dir) = store();
        let id = store.add("topic").await.unwrap();

        // Still pending; only a claimed unit may reach a terminal state.
        assert!(matches!(
            store.mark_failed(id, "never claimed").await,
            Err(PipelineError::NotFound(_))
        ));
        let unit = store.get(id).await.unwrap().unwrap();
        assert_eq!(unit.status, WorkUnitStatus::Pending);
    }

    #[tokio::test]
    async fn transitions_on_missing_unit_are_not_found() {
        let (store, _dir) = store();
        assert!(matches!(
            store.mark_completed(999).await,
            Err(PipelineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn reset_stale_returns_assigned_units_to_pending() {
        let (store, _dir) = store();
        store.add("topic").await.unwrap();
        let claimed = store.claim_next().await.unwrap().unwrap();

        let reset = store.reset_stale(Duration::ZERO).await.unwrap();
        assert_eq!(reset, 1);

        let unit = store.get(claimed.id).await.unwrap().unwrap();
        assert_eq!(unit.status, WorkUnitStatus::Pending);
        assert!(unit.assigned_at.is_none());
    }

    #[tokio::test]
    async fn concurrent_claims_never_share_a_unit() {
        let (store, _dir) = store();
        let store = Arc::new(store);
        store.add("only topic").await.unwrap();

        let a = Arc::clone(&store);
        let b = Arc::clone(&store);
        let (first, second) =
            tokio::join!(async move { a.claim_next().await }, async move { b.claim_next().await });

        let claims = [first.unwrap(), second.unwrap()];
        let claimed: Vec<_> = claims.iter().flatten().collect();
        assert_eq!(claimed.len(), 1, "exactly one claimer wins");
    }
}
