//! Conversions from infrastructure library errors into domain errors.
//!
//! Adapters work in terms of [`InfraError`] internally and convert into
//! [`PipelineError`] at the port boundary, so core never sees a rusqlite or
//! pool type.

use draftpress_domain::PipelineError;
use thiserror::Error;

/// Infrastructure-side error wrapper.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("blocking task failed: {0}")]
    Task(String),
}

impl From<InfraError> for PipelineError {
    fn from(err: InfraError) -> Self {
        match err {
            InfraError::Sqlite(inner) => PipelineError::Database(inner.to_string()),
            InfraError::Pool(inner) => PipelineError::Database(inner.to_string()),
            InfraError::Task(detail) => PipelineError::Internal(detail),
        }
    }
}

/// Map a `spawn_blocking` join failure into the domain error.
pub(crate) fn map_join_error(err: tokio::task::JoinError) -> PipelineError {
    PipelineError::from(InfraError::Task(err.to_string()))
}

/// Map a rusqlite error into the domain error.
pub(crate) fn map_sql_error(err: rusqlite::Error) -> PipelineError {
    PipelineError::from(InfraError::from(err))
}
