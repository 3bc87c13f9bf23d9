//! Retry policy for dispatched work items.
//!
//! Fixed-delay retry with a bounded number of attempts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::unit::WorkError;

/// Default number of attempts per item, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Retry policy for a work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. `1` means no retries.
    pub max_attempts: u32,

    /// Fixed pause between consecutive attempts.
    #[serde(with = "serde_duration")]
    pub delay: Duration,

    /// Condition for when to retry.
    #[serde(default)]
    pub retry_on: RetryCondition,
}

/// Conditions under which an item should be retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryCondition {
    /// Retry on any error.
    #[default]
    Always,

    /// Retry only on transient errors (timeouts, transient failures).
    TransientOnly,

    /// Never retry, regardless of max_attempts.
    Never,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
            retry_on: RetryCondition::Never,
        }
    }

    /// Up to `max_attempts` attempts with a fixed pause between them.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            retry_on: RetryCondition::Always,
        }
    }

    /// Builder: set the retry condition.
    pub fn with_condition(mut self, condition: RetryCondition) -> Self {
        self.retry_on = condition;
        self
    }

    /// Check if retries are enabled.
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 1 && self.retry_on != RetryCondition::Never
    }

    /// Whether another attempt should follow a failure.
    ///
    /// # Arguments
    /// * `attempts` - Number of attempts already made, including the failed one
    /// * `error` - The error of the failed attempt
    pub fn should_retry(&self, attempts: u32, error: &WorkError) -> bool {
        if attempts >= self.max_attempts {
            return false;
        }
        match self.retry_on {
            RetryCondition::Always => true,
            RetryCondition::TransientOnly => error.is_transient(),
            RetryCondition::Never => false,
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, one second apart.
    fn default() -> Self {
        Self::fixed(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Serializes Duration as whole milliseconds.
mod serde_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> WorkError {
        WorkError::ExecutionFailed("boom".to_string())
    }

    #[test]
    fn test_default_policy_is_three_attempts_one_second_apart() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(1));
        assert!(policy.is_enabled());
    }

    #[test]
    fn test_none_policy() {
        let policy = RetryPolicy::none();

        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.is_enabled());
        assert!(!policy.should_retry(1, &failure()));
    }

    #[test]
    fn test_should_retry_respects_max_attempts() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(1));

        assert!(policy.should_retry(1, &failure()));
        assert!(policy.should_retry(2, &failure()));
        assert!(!policy.should_retry(3, &failure()));
        assert!(!policy.should_retry(4, &failure()));
    }

    #[test]
    fn test_fixed_clamps_zero_attempts() {
        let policy = RetryPolicy::fixed(0, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn test_retry_condition_never() {
        let policy =
            RetryPolicy::fixed(3, Duration::from_secs(1)).with_condition(RetryCondition::Never);

        assert!(!policy.should_retry(1, &failure()));
    }

    #[test]
    fn test_retry_condition_transient_only() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(1))
            .with_condition(RetryCondition::TransientOnly);

        assert!(policy.should_retry(1, &WorkError::Transient("blip".to_string())));
        assert!(!policy.should_retry(1, &failure()));
    }

    #[test]
    fn test_policy_serialization() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(1500));
        let json = serde_json::to_string(&policy).expect("serialize");
        let deserialized: RetryPolicy = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(policy, deserialized);
    }
}
