//! Resilience patterns for building fault-tolerant pipelines.
//!
//! Provides the three primitives every flaky-dependency call site composes:
//! a pure backoff policy, a retry executor that applies it across bounded
//! attempts, and a circuit breaker that short-circuits calls to dependencies
//! that are currently unhealthy.

mod backoff;
mod circuit_breaker;
mod clock;
mod retry;

pub use backoff::BackoffPolicy;
pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use clock::{Clock, MockClock, SystemClock};
pub use retry::{RetryCondition, RetryConfig, RetryError, RetryExecutor};

use thiserror::Error;

/// Configuration validation error shared by the resilience builders.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }
}
