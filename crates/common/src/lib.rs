//! Modular common utilities shared across DraftPress crates.
//!
//! This crate contains the generic, reusable infrastructure the pipeline is
//! built from: backoff computation, retry execution, circuit breaking, TTL
//! caching, and bounded-concurrency fan-out. Nothing in here knows about
//! articles, topics, or databases — higher layers compose these primitives.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod cache;
pub mod concurrency;
pub mod resilience;

// Re-export commonly used types for convenience
pub use cache::TtlCache;
pub use concurrency::{parallel_map, TaskError};
pub use resilience::{
    BackoffPolicy, BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState, Clock,
    MockClock, RetryCondition, RetryConfig, RetryError, RetryExecutor, SystemClock,
};
