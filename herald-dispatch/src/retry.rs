//! Retry policy and fault classification.
//!
//! The backoff is deliberately linear (`retry_delay * attempt_count`); if
//! production ever wants an exponential curve, [`RetryPolicy::next_retry_at`]
//! is the one place to change.

use chrono::{DateTime, Duration, Utc};
use herald_provider::ProviderError;
use herald_status::OverallStatus;
use serde::{Deserialize, Serialize};

/// Retry policy for one channel handler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempt cap. Zero means the first failure dead-letters immediately.
    pub max_retries: u32,

    /// Base delay in seconds; attempt `n` waits `base * n`.
    pub retry_delay_secs: u64,
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempt_count` attempts.
    #[must_use]
    pub const fn should_retry(&self, attempt_count: u32) -> bool {
        attempt_count < self.max_retries
    }

    /// When attempt `attempt_count + 1` should run.
    #[must_use]
    pub fn next_retry_at(&self, attempt_count: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        let delay_secs = self.retry_delay_secs.saturating_mul(u64::from(attempt_count));
        now + Duration::seconds(i64::try_from(delay_secs).unwrap_or(i64::MAX))
    }

    /// Attempts remaining before the cap.
    #[must_use]
    pub const fn remaining_attempts(&self, attempt_count: u32) -> u32 {
        self.max_retries.saturating_sub(attempt_count)
    }
}

/// The five fault classes driving retry-versus-dead-letter decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// Provider 5xx, timeouts, connection failures: retry with backoff.
    Transient,
    /// Provider 429: retry, workers slow their sampling.
    RateLimited,
    /// Malformed input after re-normalization: dead-letter immediately.
    Validation,
    /// Carrier or recipient permanent fault: dead-letter immediately.
    Permanent,
    /// Anything else: retry until the cap, then dead-letter.
    Unknown,
}

impl FaultClass {
    /// Classify a provider error.
    #[must_use]
    pub const fn of(error: &ProviderError) -> Self {
        match error {
            ProviderError::Permanent(_) => Self::Permanent,
            ProviderError::Transient(_) | ProviderError::NotInitialized => Self::Transient,
            ProviderError::RateLimited(_) => Self::RateLimited,
            ProviderError::Validation(_) => Self::Validation,
        }
    }

    /// Whether this class skips retries entirely.
    #[must_use]
    pub const fn dead_letters_immediately(self) -> bool {
        matches!(self, Self::Validation | Self::Permanent)
    }
}

/// The final status a permanent provider error maps to.
///
/// Opt-outs and carrier blocks get their dedicated statuses so operators see
/// the permanent-reason tag; everything else permanent is a plain `failed`.
#[must_use]
pub fn final_status_for(error: &ProviderError) -> OverallStatus {
    use herald_provider::PermanentError;

    match error {
        ProviderError::Permanent(PermanentError::OptedOut(_)) => OverallStatus::OptedOut,
        ProviderError::Permanent(PermanentError::Blocked(_)) => OverallStatus::Blocked,
        _ => OverallStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use herald_provider::{PermanentError, TransientError};

    use super::*;

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy {
            max_retries: 3,
            retry_delay_secs: 30,
        };
        let now = Utc::now();

        assert_eq!(policy.next_retry_at(1, now), now + Duration::seconds(30));
        assert_eq!(policy.next_retry_at(2, now), now + Duration::seconds(60));
        assert_eq!(policy.next_retry_at(3, now), now + Duration::seconds(90));
    }

    #[test]
    fn test_should_retry_respects_cap() {
        let policy = RetryPolicy {
            max_retries: 3,
            retry_delay_secs: 30,
        };
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));

        assert_eq!(policy.remaining_attempts(1), 2);
        assert_eq!(policy.remaining_attempts(5), 0);
    }

    #[test]
    fn test_zero_retries_dead_letters_first_failure() {
        let policy = RetryPolicy {
            max_retries: 0,
            retry_delay_secs: 30,
        };
        assert!(!policy.should_retry(1));
    }

    #[test]
    fn test_fault_classification() {
        let transient =
            ProviderError::Transient(TransientError::Unavailable("503".to_string()));
        assert_eq!(FaultClass::of(&transient), FaultClass::Transient);
        assert!(!FaultClass::of(&transient).dead_letters_immediately());

        let limited = ProviderError::RateLimited("429".to_string());
        assert_eq!(FaultClass::of(&limited), FaultClass::RateLimited);

        let validation = ProviderError::Validation("bad address".to_string());
        assert!(FaultClass::of(&validation).dead_letters_immediately());

        let permanent =
            ProviderError::Permanent(PermanentError::OptedOut("opted out".to_string()));
        assert!(FaultClass::of(&permanent).dead_letters_immediately());
    }

    #[test]
    fn test_final_status_mapping() {
        assert_eq!(
            final_status_for(&ProviderError::Permanent(PermanentError::OptedOut(
                "Recipient opted out".to_string()
            ))),
            OverallStatus::OptedOut
        );
        assert_eq!(
            final_status_for(&ProviderError::Permanent(PermanentError::Blocked(
                "number blocked".to_string()
            ))),
            OverallStatus::Blocked
        );
        assert_eq!(
            final_status_for(&ProviderError::Permanent(PermanentError::InvalidRecipient(
                "invalid phone number".to_string()
            ))),
            OverallStatus::Failed
        );
        assert_eq!(
            final_status_for(&ProviderError::Transient(TransientError::Timeout(
                "slow".to_string()
            ))),
            OverallStatus::Failed
        );
    }
}
