//! Scheduler configuration (spec §4.2, §6 `BatchProcessing`/`ApiTimeout`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::RetryPolicy;

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 2;
pub const MAX_CONCURRENCY_LIMIT: usize = 4;

/// Content length (chars) above which the long per-call timeout applies.
const LONG_TIMEOUT_CONTENT_THRESHOLD: usize = 3000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Width of the per-batch concurrency semaphore (default 2, max 4).
    pub concurrency_limit: usize,
    pub retry_policy: RetryPolicy,
    #[serde(with = "duration_secs")]
    pub default_call_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub long_call_timeout: Duration,
    pub long_timeout_content_threshold: usize,
    #[serde(with = "duration_secs")]
    pub safe_checkpoint_timeout: Duration,
    /// Optional soft wall-clock timeout for an entire batch.
    #[serde(default, with = "option_duration_secs")]
    pub batch_wall_clock_timeout: Option<Duration>,
    pub progress_window: usize,
    pub batch_ttl: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            retry_policy: RetryPolicy::default(),
            default_call_timeout: Duration::from_secs(30),
            long_call_timeout: Duration::from_secs(60),
            long_timeout_content_threshold: LONG_TIMEOUT_CONTENT_THRESHOLD,
            safe_checkpoint_timeout: Duration::from_secs(15),
            batch_wall_clock_timeout: None,
            progress_window: 20,
            batch_ttl: Duration::from_secs(3600),
        }
    }
}

impl SchedulerConfig {
    pub fn clamped(mut self) -> Self {
        self.concurrency_limit = self.concurrency_limit.clamp(1, MAX_CONCURRENCY_LIMIT);
        self
    }

    /// Per-call timeout for a segment of the given content length (spec
    /// §4.2 step 3: long timeout applies above a content-length threshold).
    pub fn call_timeout_for(&self, content_len: usize) -> Duration {
        if content_len > self.long_timeout_content_threshold {
            self.long_call_timeout
        } else {
            self.default_call_timeout
        }
    }

    /// Fail-fast threshold: strictly greater than `floor(total/2)` failures
    /// aborts the batch (spec §4.2).
    pub fn fail_fast_threshold(total: usize) -> usize {
        total / 2
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod option_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_enforces_max_concurrency() {
        let config = SchedulerConfig {
            concurrency_limit: 10,
            ..SchedulerConfig::default()
        }
        .clamped();
        assert_eq!(config.concurrency_limit, MAX_CONCURRENCY_LIMIT);
    }

    #[test]
    fn fail_fast_threshold_matches_spec_scenario() {
        // 10 segments -> threshold 5, so 6th failure trips it.
        assert_eq!(SchedulerConfig::fail_fast_threshold(10), 5);
    }

    #[test]
    fn long_timeout_applies_above_threshold() {
        let config = SchedulerConfig::default();
        assert_eq!(config.call_timeout_for(100), config.default_call_timeout);
        assert_eq!(config.call_timeout_for(5000), config.long_call_timeout);
    }
}
