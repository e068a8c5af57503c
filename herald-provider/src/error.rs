//! Typed provider errors.
//!
//! The split between permanent and transient failures drives the retry and
//! dead-letter decisions downstream: permanent errors dead-letter
//! immediately, transient and rate-limited errors retry with backoff.

use thiserror::Error;

/// Top-level provider error type.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Permanent failure that must not be retried.
    #[error("Permanent failure: {0}")]
    Permanent(#[from] PermanentError),

    /// Transient failure that can be retried with backoff.
    #[error("Transient failure: {0}")]
    Transient(#[from] TransientError),

    /// Provider rate limit hit; retry, but slow down.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Request rejected before any provider call was made.
    #[error("Validation failure: {0}")]
    Validation(String),

    /// Client used before `initialize` completed.
    #[error("Provider client not initialized")]
    NotInitialized,
}

/// Permanent, carrier- or recipient-level failures.
#[derive(Debug, Error)]
pub enum PermanentError {
    /// Recipient opted out of this channel.
    #[error("Recipient opted out: {0}")]
    OptedOut(String),

    /// Carrier blocks messages to this recipient.
    #[error("Recipient blocked: {0}")]
    Blocked(String),

    /// Address failed re-normalization or is undeliverable.
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    /// Email hard bounce.
    #[error("Hard bounce: {0}")]
    HardBounce(String),

    /// Provider rejected the message outright.
    #[error("Message rejected: {0}")]
    Rejected(String),
}

/// Transient failures worth retrying.
#[derive(Debug, Error)]
pub enum TransientError {
    /// Provider returned a 5xx response.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The request exceeded its deadline.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection-level failure before a response arrived.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

impl ProviderError {
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::NotInitialized)
    }

    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Classify a provider HTTP status code.
    ///
    /// `429` is rate-limited, other `4xx` are permanent rejections, `5xx`
    /// and anything unexpected are transient.
    #[must_use]
    pub fn from_status(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            429 => Self::RateLimited(message),
            400..=499 => Self::Permanent(PermanentError::Rejected(format!("{code} {message}"))),
            _ => Self::Transient(TransientError::Unavailable(format!("{code} {message}"))),
        }
    }
}

impl PermanentError {
    /// Recognize a documented carrier error message.
    ///
    /// Matching is substring-based over the lowercased message, mirroring
    /// how the carrier reports reach us as free text.
    #[must_use]
    pub fn from_carrier_message(message: &str) -> Option<Self> {
        let lowered = message.to_ascii_lowercase();

        if lowered.contains("opted out") || lowered.contains("opt-out") {
            Some(Self::OptedOut(message.to_string()))
        } else if lowered.contains("blocked") {
            Some(Self::Blocked(message.to_string()))
        } else if lowered.contains("invalid phone number")
            || lowered.contains("invalid recipient")
        {
            Some(Self::InvalidRecipient(message.to_string()))
        } else if lowered.contains("hard bounce") || lowered.contains("bounced") {
            Some(Self::HardBounce(message.to_string()))
        } else {
            None
        }
    }
}
