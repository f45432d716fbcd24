//! Error taxonomy for the pipeline.
//!
//! One enum covers every failure class the orchestration layer distinguishes,
//! so callers can match on the class without knowing which adapter produced
//! it. Infrastructure crates convert their library errors into these variants
//! at the boundary.

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// All error conditions the pipeline distinguishes.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Persistence failed (connection, query, or migration).
    #[error("database error: {0}")]
    Database(String),

    /// Invalid configuration detected before any work started.
    #[error("configuration error: {0}")]
    Config(String),

    /// The article generator failed after all resilience layers gave up.
    #[error("generation error: {0}")]
    Generation(String),

    /// Publishing the finished artifact failed.
    #[error("publish error: {0}")]
    Publish(String),

    /// A produced artifact failed structural validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The referenced record does not exist or is not in an eligible state.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller supplied input the pipeline cannot act on.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A bug or broken invariant inside the pipeline itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// True for failures worth surfacing to an operator channel.
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Publish(_) | Self::Internal(_))
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("malformed JSON payload: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_class_and_detail() {
        let err = PipelineError::Generation("model unavailable".to_string());
        assert_eq!(err.to_string(), "generation error: model unavailable");
    }

    #[test]
    fn operational_classification() {
        assert!(PipelineError::Database("locked".into()).is_operational());
        assert!(PipelineError::Publish("push rejected".into()).is_operational());
        assert!(!PipelineError::Validation("too short".into()).is_operational());
        assert!(!PipelineError::NotFound("job 9".into()).is_operational());
    }

    #[test]
    fn json_errors_map_to_invalid_input() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: PipelineError = json_err.into();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }
}
