//! SQLite-backed daily metrics counters.
//!
//! One row per calendar day, incremented with an upsert. Keys are
//! `YYYY-MM-DD` strings so the recent-window query can lean on SQLite's
//! `date()` arithmetic.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use draftpress_core::MetricsSink;
use draftpress_domain::Result;
use rusqlite::{params, Connection};
use tokio::task;

use super::manager::DbManager;
use crate::errors::{map_join_error, map_sql_error};

/// Aggregated counters over a recent window of days.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsTotals {
    pub articles_published: u64,
    pub generation_failures: u64,
    pub tokens_used: u64,
    pub errors: u64,
}

/// SQLite-backed metrics sink.
pub struct SqliteMetricsSink {
    db: Arc<DbManager>,
}

impl SqliteMetricsSink {
    /// Construct a sink backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Sum the daily counters over the last `days` days (including today).
    pub async fn recent_totals(&self, days: u32) -> Result<MetricsTotals> {
        let db = Arc::clone(&self.db);
        let window = format!("-{days} days");

        task::spawn_blocking(move || -> Result<MetricsTotals> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT COALESCE(SUM(articles_published), 0),
                        COALESCE(SUM(generation_failures), 0),
                        COALESCE(SUM(tokens_used), 0),
                        COALESCE(SUM(errors), 0)
                 FROM metrics WHERE date >= date('now', ?1)",
                params![window],
                |row| {
                    Ok(MetricsTotals {
                        articles_published: row.get(0)?,
                        generation_failures: row.get(1)?,
                        tokens_used: row.get(2)?,
                        errors: row.get(3)?,
                    })
                },
            )
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    fn increment(conn: &Connection, column: &'static str, amount: i64) -> Result<()> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        // Column names come from the fixed call sites below, never input.
        conn.execute(
            &format!(
                "INSERT INTO metrics (date, {column}) VALUES (?1, ?2)
                 ON CONFLICT(date) DO UPDATE SET {column} = {column} + excluded.{column}"
            ),
            params![today, amount],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    async fn increment_on_pool(&self, column: &'static str, amount: i64) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            Self::increment(&conn, column, amount)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl MetricsSink for SqliteMetricsSink {
    async fn record_published(&self, tokens_used: u64) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            Self::increment(&conn, "articles_published", 1)?;
            Self::increment(&conn, "tokens_used", tokens_used as i64)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn record_generation_failure(&self) -> Result<()> {
        self.increment_on_pool("generation_failures", 1).await
    }

    async fn record_error(&self) -> Result<()> {
        self.increment_on_pool("errors", 1).await
    }
}
