//! Circuit breaker keyed to a single named dependency.
//!
//! The breaker tracks consecutive failures of the wrapped operation and
//! short-circuits calls while the dependency is deemed unhealthy, giving it
//! time to recover instead of hammering it with doomed requests.
//!
//! State machine:
//! - `Closed` (initial): calls pass through. Success resets the failure
//!   counter; a failure that reaches the threshold opens the circuit.
//! - `Open`: calls are rejected with [`BreakerError::Open`] without invoking
//!   the operation. Once `recovery_timeout` has elapsed since the last
//!   failure, the next call transitions to `HalfOpen` and is itself attempted.
//! - `HalfOpen`: the probe call runs. Success closes the circuit and resets
//!   the counter; failure reopens it and refreshes the failure timestamp.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::ConfigError;

/// Errors produced by a circuit-breaker-wrapped call.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("circuit '{name}' is open, rejecting call")]
    Open { name: String },

    /// The wrapped operation ran and failed.
    #[error("operation failed")]
    Operation {
        #[source]
        source: E,
    },
}

impl<E> BreakerError<E> {
    /// True when the call was rejected without reaching the dependency.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests.
    Closed,
    /// Circuit is open, rejecting requests.
    Open,
    /// Circuit is half-open, allowing a probe request to test recovery.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Time to wait after the last failure before probing recovery.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, recovery_timeout: Duration::from_secs(60) }
    }
}

impl CircuitBreakerConfig {
    /// Create a config with the given threshold and recovery window.
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self { failure_threshold, recovery_timeout }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold must be greater than 0"));
        }
        Ok(())
    }
}

/// Mutable breaker state, guarded by a single lock per spec: call volume is
/// low and the critical sections are short.
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

/// Circuit breaker instance scoped to one named dependency.
///
/// Cloning shares state: clones observe and drive the same circuit. Generic
/// over [`Clock`] so recovery-timeout behavior is testable without delays.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: String,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerState>>,
    clock: Arc<C>,
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a breaker for the named dependency using the system clock.
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(name, config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a breaker with a custom clock (useful for testing).
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: C,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            inner: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
            })),
            clock: Arc::new(clock),
        })
    }

    /// Name of the guarded dependency.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current circuit state.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Current consecutive-failure count.
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Execute an async operation through the breaker.
    ///
    /// Rejects immediately with [`BreakerError::Open`] while the circuit is
    /// open and the recovery window has not elapsed. The lock is released
    /// before the operation runs; only the state transition is synchronized.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire() {
            debug!(circuit = %self.name, "circuit open, fast failing");
            return Err(BreakerError::Open { name: self.name.clone() });
        }

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(BreakerError::Operation { source: err })
            }
        }
    }

    /// Check whether a call may proceed, transitioning `Open → HalfOpen`
    /// when the recovery timeout has elapsed.
    fn try_acquire(&self) -> bool {
        let mut guard = self.lock_mut();
        match guard.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = guard
                    .last_failure_at
                    .map(|at| self.clock.now().saturating_duration_since(at));
                match elapsed {
                    Some(elapsed) if elapsed >= self.config.recovery_timeout => {
                        guard.state = CircuitState::HalfOpen;
                        info!(circuit = %self.name, "recovery window elapsed, probing half-open");
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    fn on_success(&self) {
        let mut guard = self.lock_mut();
        if guard.state == CircuitState::HalfOpen {
            info!(circuit = %self.name, "probe succeeded, closing circuit");
        }
        guard.state = CircuitState::Closed;
        guard.failure_count = 0;
    }

    fn on_failure(&self) {
        let mut guard = self.lock_mut();
        guard.failure_count += 1;
        guard.last_failure_at = Some(self.clock.now());

        match guard.state {
            CircuitState::HalfOpen => {
                warn!(circuit = %self.name, "probe failed, reopening circuit");
                guard.state = CircuitState::Open;
            }
            CircuitState::Closed if guard.failure_count >= self.config.failure_threshold => {
                warn!(
                    circuit = %self.name,
                    failures = guard.failure_count,
                    "failure threshold reached, opening circuit"
                );
                guard.state = CircuitState::Open;
            }
            _ => {}
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.lock_mut()
    }

    fn lock_mut(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        // A poisoned lock means a panic inside a short state-transition
        // section; the state itself is still coherent, so keep going.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(circuit = %self.name, "breaker state lock poisoned");
                poisoned.into_inner()
            }
        }
    }
}
