//! Per-channel handler configuration.

use std::time::Duration;

use herald_common::{Channel, DomainError};
use serde::{Deserialize, Serialize};

fn default_workers() -> usize {
    num_cpus::get().max(1)
}

const fn default_processing_delay_ms() -> u64 {
    0
}

const fn default_retry_delay_secs() -> u64 {
    30
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_batch_size() -> usize {
    25
}

const fn default_true() -> bool {
    true
}

/// Per-worker queue depth. SMS providers throttle harder, so its default is
/// smaller than email's.
const fn default_queue_capacity(channel: Channel) -> usize {
    match channel {
        Channel::Email => 200,
        Channel::Sms => 50,
    }
}

const fn default_maintenance_interval_secs() -> u64 {
    30
}

const fn default_retry_sweep_interval_secs() -> u64 {
    60
}

const fn default_shutdown_grace_secs() -> u64 {
    10
}

const fn default_enqueue_timeout_secs() -> u64 {
    5
}

/// Configuration for one channel handler service.
///
/// Invalid configuration fails fast at startup with `Validation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Queue this handler subscribes to.
    pub queue_name: String,

    /// Number of workers in the pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Artificial pause between jobs on one worker, for provider pacing.
    #[serde(default = "default_processing_delay_ms")]
    pub processing_delay_ms: u64,

    /// Base retry delay; attempt `n` waits `retry_delay * n`.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Retry cap. Zero dead-letters on the first failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum failed messages examined per retry sweep.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Record dead letters; when off they are only logged.
    #[serde(default = "default_true")]
    pub dead_letter_enabled: bool,

    /// Per-worker bounded queue depth.
    #[serde(default)]
    pub queue_capacity: Option<usize>,

    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,

    #[serde(default = "default_retry_sweep_interval_secs")]
    pub retry_sweep_interval_secs: u64,

    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    #[serde(default = "default_enqueue_timeout_secs")]
    pub enqueue_timeout_secs: u64,
}

impl ChannelConfig {
    /// A configuration with channel-appropriate defaults.
    #[must_use]
    pub fn for_channel(channel: Channel) -> Self {
        Self {
            queue_name: format!("notifications-{channel}"),
            workers: default_workers(),
            processing_delay_ms: default_processing_delay_ms(),
            retry_delay_secs: default_retry_delay_secs(),
            max_retries: default_max_retries(),
            batch_size: default_batch_size(),
            dead_letter_enabled: true,
            queue_capacity: Some(default_queue_capacity(channel)),
            maintenance_interval_secs: default_maintenance_interval_secs(),
            retry_sweep_interval_secs: default_retry_sweep_interval_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            enqueue_timeout_secs: default_enqueue_timeout_secs(),
        }
    }

    /// Validate at startup.
    ///
    /// # Errors
    /// `Validation` on an empty queue name, zero workers, or a zero queue
    /// capacity.
    pub fn validate(&self, channel: Channel) -> Result<(), DomainError> {
        if self.queue_name.trim().is_empty() {
            return Err(DomainError::validation("queue name must not be empty")
                .with_field("queue_name", &self.queue_name));
        }
        if self.workers == 0 {
            return Err(DomainError::validation("at least one worker is required")
                .with_field("workers", "0"));
        }
        if self.capacity(channel) == 0 {
            return Err(DomainError::validation("queue capacity must be positive")
                .with_field("queue_capacity", "0"));
        }
        Ok(())
    }

    /// Effective per-worker queue capacity for `channel`.
    #[must_use]
    pub fn capacity(&self, channel: Channel) -> usize {
        self.queue_capacity
            .unwrap_or_else(|| default_queue_capacity(channel))
    }

    #[must_use]
    pub const fn enqueue_timeout(&self) -> Duration {
        Duration::from_secs(self.enqueue_timeout_secs)
    }

    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    #[must_use]
    pub const fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }

    #[must_use]
    pub const fn retry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.retry_sweep_interval_secs)
    }

    #[must_use]
    pub const fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_defaults() {
        let email = ChannelConfig::for_channel(Channel::Email);
        assert_eq!(email.queue_name, "notifications-email");
        assert_eq!(email.capacity(Channel::Email), 200);
        assert_eq!(email.max_retries, 3);

        let sms = ChannelConfig::for_channel(Channel::Sms);
        assert_eq!(sms.queue_name, "notifications-sms");
        assert_eq!(sms.capacity(Channel::Sms), 50);
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let mut config = ChannelConfig::for_channel(Channel::Email);
        config.workers = 0;
        assert!(
            config
                .validate(Channel::Email)
                .unwrap_err()
                .is_validation()
        );

        let mut config = ChannelConfig::for_channel(Channel::Sms);
        config.queue_name = " ".to_string();
        assert!(config.validate(Channel::Sms).unwrap_err().is_validation());

        let mut config = ChannelConfig::for_channel(Channel::Sms);
        config.queue_capacity = Some(0);
        assert!(config.validate(Channel::Sms).unwrap_err().is_validation());
    }
}
