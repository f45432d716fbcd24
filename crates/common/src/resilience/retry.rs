//! Retry executor applying a [`BackoffPolicy`] across bounded attempts.
//!
//! The executor wraps an arbitrary fallible async operation. Between attempts
//! it suspends the calling task with `tokio::time::sleep` — no lock is held
//! across the sleep and sibling tasks keep running. When attempts are
//! exhausted the last failure is propagated verbatim inside
//! [`RetryError::Exhausted`], never swallowed.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::backoff::BackoffPolicy;
use super::ConfigError;

/// Errors that can occur during retry operations.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All attempts failed; carries the error from the final attempt.
    #[error("all {attempts} retry attempts exhausted")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The retry condition classified the error as permanent.
    #[error("operation failed with non-retryable error")]
    NonRetryable {
        #[source]
        source: E,
    },
}

impl<E> RetryError<E> {
    /// Unwrap the underlying operation error.
    pub fn into_source(self) -> E {
        match self {
            Self::Exhausted { source, .. } | Self::NonRetryable { source } => source,
        }
    }
}

/// Predicate deciding whether a failure is worth another attempt.
///
/// The default is [`RetryCondition::Always`]: every error is retried
/// identically. Callers that can distinguish permanent failures (bad
/// credentials, malformed requests) opt into `Custom`.
#[derive(Clone, Default)]
pub enum RetryCondition {
    /// Retry all errors.
    #[default]
    Always,
    /// Retry only errors the predicate accepts. The predicate sees the
    /// error as a `'static` trait object so it can downcast to a concrete
    /// error type.
    Custom(Arc<dyn Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync>),
}

impl std::fmt::Debug for RetryCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Always => write!(f, "Always"),
            Self::Custom(_) => write!(f, "Custom(<predicate>)"),
        }
    }
}

impl RetryCondition {
    fn allows(&self, error: &(dyn std::error::Error + 'static)) -> bool {
        match self {
            Self::Always => true,
            Self::Custom(predicate) => predicate(error),
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first call.
    pub max_attempts: u32,
    /// Backoff schedule applied between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, backoff: BackoffPolicy::default() }
    }
}

impl RetryConfig {
    /// Create a config with the given attempt budget and backoff.
    pub fn new(max_attempts: u32, backoff: BackoffPolicy) -> Self {
        Self { max_attempts, backoff }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts must be greater than 0"));
        }
        self.backoff.validate()
    }
}

/// Retry executor parameterized by config and an optional retry condition.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    condition: RetryCondition,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryExecutor {
    /// Create an executor that retries every error.
    pub fn new(config: RetryConfig) -> Self {
        Self { config, condition: RetryCondition::Always }
    }

    /// Create an executor with a custom retry condition.
    pub fn with_condition(config: RetryConfig, condition: RetryCondition) -> Self {
        Self { config, condition }
    }

    /// Get the configured attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Execute `operation` up to `max_attempts` times.
    ///
    /// Returns the first success, or the final failure wrapped in
    /// [`RetryError`]. `operation_name` is used only for log context.
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T, E>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = operation_name, attempt, "retry succeeded");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !self.condition.allows(&err) {
                        debug!(operation = operation_name, error = %err, "error is not retryable");
                        return Err(RetryError::NonRetryable { source: err });
                    }

                    if attempt >= max_attempts {
                        warn!(
                            operation = operation_name,
                            attempts = max_attempts,
                            error = %err,
                            "all retry attempts failed"
                        );
                        return Err(RetryError::Exhausted { attempts: max_attempts, source: err });
                    }

                    let delay = self.config.backoff.delay_for(attempt);
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts,
                        delay = ?delay,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
