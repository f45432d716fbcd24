//! Pure backoff delay computation.
//!
//! Separated from the retry executor so delay schedules can be asserted
//! without running an operation.

use std::time::Duration;

use rand::Rng;

use super::ConfigError;

/// Jitter scales the computed delay by a uniform factor in this range.
const JITTER_MIN: f64 = 0.8;
const JITTER_MAX: f64 = 1.2;

/// Exponential backoff policy with an upper delay cap and optional jitter.
///
/// Given a 1-indexed attempt number `a`, the delay is
/// `min(base_delay * backoff_factor^(a-1), max_delay)`, optionally scaled by
/// a uniform random factor in `[0.8, 1.2]`. Deterministic when jitter is
/// disabled; never negative or unbounded.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound applied before jitter.
    pub max_delay: Duration,
    /// Multiplier applied per additional attempt.
    pub backoff_factor: f64,
    /// Whether to randomize the delay to avoid thundering herds.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Fixed-step policy useful for tests and polling loops.
    pub fn fixed(delay: Duration) -> Self {
        Self { base_delay: delay, max_delay: delay, backoff_factor: 1.0, jitter: false }
    }

    /// Set the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the per-attempt multiplier.
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Validate the policy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backoff_factor < 1.0 {
            return Err(ConfigError::invalid(format!(
                "backoff_factor must be >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigError::invalid(format!(
                "base_delay ({:?}) cannot be greater than max_delay ({:?})",
                self.base_delay, self.max_delay
            )));
        }
        Ok(())
    }

    /// Compute the delay before retrying after `attempt` failures.
    ///
    /// `attempt` is 1-indexed: the delay after the first failed attempt is
    /// `base_delay`. An `attempt` of 0 is treated as 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let base_millis = self.base_delay.as_millis() as f64;
        let max_millis = self.max_delay.as_millis() as f64;

        let delay_millis = (base_millis * self.backoff_factor.powi(exponent as i32)).min(max_millis);
        let delay = Duration::from_millis(delay_millis as u64);

        if self.jitter {
            apply_jitter(delay)
        } else {
            delay
        }
    }
}

/// Exponent cap so `powi` stays well clear of overflow even with large factors.
const MAX_BACKOFF_EXPONENT: u32 = 32;

fn apply_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let factor = rng.gen_range(JITTER_MIN..=JITTER_MAX);
    let millis = (delay.as_millis() as f64 * factor).max(0.0) as u64;
    Duration::from_millis(millis)
}
