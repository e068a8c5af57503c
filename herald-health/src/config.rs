//! Health probe configuration.

use std::net::SocketAddr;
use std::time::Duration;

use herald_common::DomainError;
use serde::Deserialize;

/// Configuration for the probe server and the readiness refresh loop.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Disable to run without the probe server (the readiness loop still
    /// refreshes component flags for operator queries).
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Socket address the probe server binds.
    #[serde(default = "defaults::listen_address")]
    pub listen_address: String,

    /// Queued-work ceiling across all worker pools. Above it the readiness
    /// probe fails so the event-bus consumer stops feeding a saturated
    /// service.
    #[serde(default = "defaults::max_queue_size")]
    pub max_queue_size: u64,

    /// How often the component probes (subscriber store, status store,
    /// channel handlers) refresh the readiness flags.
    #[serde(default = "defaults::probe_interval_secs")]
    pub probe_interval_secs: u64,
}

impl HealthConfig {
    /// Fail fast on an unusable probe configuration.
    ///
    /// # Errors
    /// `Validation` when the listen address is not a socket address or the
    /// probe interval is zero.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.enabled && self.listen_address.parse::<SocketAddr>().is_err() {
            return Err(
                DomainError::validation("health listen address is not a socket address")
                    .with_field("listen_address", &self.listen_address),
            );
        }
        if self.probe_interval_secs == 0 {
            return Err(DomainError::validation("probe interval must be positive")
                .with_field("probe_interval_secs", "0"));
        }
        Ok(())
    }

    /// The readiness refresh cadence.
    #[must_use]
    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            listen_address: defaults::listen_address(),
            max_queue_size: defaults::max_queue_size(),
            probe_interval_secs: defaults::probe_interval_secs(),
        }
    }
}

mod defaults {
    pub const fn enabled() -> bool {
        true
    }

    pub fn listen_address() -> String {
        "[::]:8080".to_string()
    }

    pub const fn max_queue_size() -> u64 {
        10000
    }

    pub const fn probe_interval_secs() -> u64 {
        10
    }
}
