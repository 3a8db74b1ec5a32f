//! Tuning knobs for retries and stabilization
//!
//! These are per-resource settings, not part of the reconciliation
//! contract. Defaults suit a rate-limited control-plane API.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff for transient failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Fraction of each delay that is randomized, in `0.0..=1.0`
    pub jitter: f64,
    /// Overall time budget across all attempts
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
            max_elapsed: Some(Duration::from_secs(300)),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Deterministic delay before retry number `attempt` (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Delay with jitter applied: uniformly within `[d * (1 - jitter), d]`
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || delay.is_zero() {
            return delay;
        }
        let factor = rand::thread_rng().gen_range((1.0 - jitter)..=1.0);
        delay.mul_f64(factor)
    }
}

/// Polling after create until the new object is visible
#[derive(Debug, Clone, PartialEq)]
pub struct StabilizeConfig {
    /// Give up after this long
    pub timeout: Duration,
    /// First poll interval
    pub poll_interval: Duration,
    /// Poll interval grows by this factor after each miss
    pub backoff_factor: f64,
    /// Upper bound on the poll interval
    pub max_poll_interval: Duration,
}

impl Default for StabilizeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            backoff_factor: 1.5,
            max_poll_interval: Duration::from_secs(10),
        }
    }
}

impl StabilizeConfig {
    pub fn interval_for_poll(&self, poll: u32) -> Duration {
        let secs = self.poll_interval.as_secs_f64() * self.backoff_factor.powi(poll as i32);
        Duration::from_secs_f64(secs.min(self.max_poll_interval.as_secs_f64()).max(0.0))
    }
}

/// All tuning for one resource kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileConfig {
    pub retry: RetryPolicy,
    pub stabilize: StabilizeConfig,
}
