//! Retry policy value object.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for transient per-segment provider errors (spec §4.2, §7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial try).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay between retries in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Multiplier for exponential backoff.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Jitter fraction applied to each computed delay (±jitter_pct).
    #[serde(default = "default_jitter_pct")]
    pub jitter_pct: f64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_jitter_pct() -> f64 {
    0.2
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_pct: default_jitter_pct(),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic component of the delay for the given attempt (1-indexed:
    /// this is the delay observed *before* attempt `attempt`).
    fn deterministic_delay_ms(&self, attempt: u32) -> f64 {
        self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32)
    }

    /// Compute the sleep duration before retrying, including jitter in
    /// `[-jitter_pct, +jitter_pct]` of the deterministic delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.deterministic_delay_ms(attempt);
        let jitter_span = base * self.jitter_pct;
        // rand::random::<f64>() is in [0, 1); map to [-jitter_span, +jitter_span]
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_span;
        let total_ms = (base + jitter).max(0.0);
        Duration::from_millis(total_ms as u64)
    }

    /// Lower bound on the delay for a given attempt, used by tests that
    /// assert the observed gap respects the worst-case negative jitter.
    pub fn min_delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.deterministic_delay_ms(attempt);
        Duration::from_millis((base * (1.0 - self.jitter_pct)).max(0.0) as u64)
    }

    /// Whether another retry should be attempted given the attempts made so far.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made <= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_retries, 3);
        assert_eq!(p.base_delay_ms, 1000);
    }

    #[test]
    fn delay_grows_exponentially_within_jitter_band() {
        let p = RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
            jitter_pct: 0.2,
        };
        // attempt 1 -> ~1000ms, attempt 2 -> ~2000ms
        assert!(p.min_delay_for_attempt(1).as_millis() >= 800);
        assert!(p.min_delay_for_attempt(2).as_millis() >= 1600);
    }

    #[test]
    fn should_retry_bounds() {
        let p = RetryPolicy::default();
        assert!(p.should_retry(0));
        assert!(p.should_retry(3));
        assert!(!p.should_retry(4));
    }
}
