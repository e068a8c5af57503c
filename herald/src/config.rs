//! Top-level service configuration.

use std::path::PathBuf;

use herald_common::audit::AuditConfig;
use herald_common::{Channel, DomainError};
use herald_dispatch::ChannelConfig;
use herald_health::HealthConfig;
use herald_provider::{EmailProviderConfig, SmsProviderConfig};
use serde::Deserialize;

const fn default_flush_interval_secs() -> u64 {
    60
}

fn default_environment() -> String {
    "production".to_string()
}

/// The whole service configuration, loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct HeraldConfig {
    #[serde(default = "default_environment")]
    pub environment: String,

    /// How often the dispatcher drains due hourly/daily windows.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    pub email: ChannelSection,
    pub sms: SmsSection,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

/// Email channel section: handler knobs plus provider credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSection {
    #[serde(flatten)]
    pub channel: ChannelConfig,
    pub provider: EmailProviderConfig,
}

/// SMS channel section: handler knobs plus provider credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct SmsSection {
    #[serde(flatten)]
    pub channel: ChannelConfig,
    pub provider: SmsProviderConfig,
}

impl HeraldConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    /// `Validation` when the document does not parse or a channel section is
    /// invalid.
    pub fn from_toml(content: &str) -> Result<Self, DomainError> {
        let config: Self = toml::from_str(content).map_err(|error| {
            DomainError::validation(format!("configuration does not parse: {error}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on invalid configuration.
    ///
    /// # Errors
    /// `Validation` on any invalid section.
    pub fn validate(&self) -> Result<(), DomainError> {
        self.email.channel.validate(Channel::Email)?;
        self.sms.channel.validate(Channel::Sms)?;
        self.health.validate()?;
        Ok(())
    }
}

/// Find the configuration file using the following precedence:
/// 1. `HERALD_CONFIG` environment variable
/// 2. ./herald.toml (current working directory)
/// 3. /etc/herald/herald.toml (system-wide config)
///
/// # Errors
/// When no candidate exists.
pub fn find_config_file() -> anyhow::Result<PathBuf> {
    if let Ok(env_path) = std::env::var("HERALD_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "HERALD_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = [
        PathBuf::from("./herald.toml"),
        PathBuf::from("/etc/herald/herald.toml"),
    ];

    for path in &default_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - HERALD_CONFIG environment variable\n{paths_tried}"
    )
}
