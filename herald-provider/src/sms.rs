//! The SMS provider client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use herald_common::address;
use herald_common::text::{CONCAT_SMS_MAX_BYTES, truncate_message};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{ProviderError, TransientError};
use crate::transport::SmsTransport;

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_delay_secs() -> u64 {
    30
}

const fn default_request_timeout_secs() -> u64 {
    30
}

/// SMS provider configuration, validated at `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsProviderConfig {
    pub connection_string: String,
    /// Sender number, must be US E.164.
    pub from_number: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl SmsProviderConfig {
    /// Validate at initialization time.
    ///
    /// # Errors
    /// `Validation` on an empty connection string or a `from_number` that is
    /// not a valid US number.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.connection_string.trim().is_empty() {
            return Err(ProviderError::Validation(
                "connection string must not be empty".to_string(),
            ));
        }
        if !address::is_valid_us_phone(&self.from_number) {
            return Err(ProviderError::Validation(format!(
                "from number is not a valid US number: {:?}",
                self.from_number
            )));
        }
        Ok(())
    }
}

/// A send request as handed to the wire transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSmsRequest {
    pub from: String,
    pub to: Vec<String>,
    pub message: String,
    #[serde(default)]
    pub delivery_report_enabled: bool,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Per-recipient outcome of a send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsRecipientResult {
    pub to: String,
    pub message_id: String,
    pub http_status_code: u16,
    pub successful: bool,
    #[serde(default)]
    pub repeatability_result: Option<String>,
}

/// Provider-side acknowledgement of a send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendSmsResponse {
    pub message_id: String,
    pub to: Vec<SmsRecipientResult>,
}

/// Detail block of a delivery report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsDeliveryStatusDetails {
    pub status_message: String,
    pub timestamp: DateTime<Utc>,
}

/// Provider-side delivery report for a previously sent message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsDeliveryReport {
    pub message_id: String,
    pub from: String,
    pub to: String,
    pub delivery_status: String,
    pub delivery_status_details: SmsDeliveryStatusDetails,
    pub received_timestamp: DateTime<Utc>,
}

/// Typed wrapper over the external SMS API.
#[derive(Debug, Clone)]
pub struct SmsClient {
    transport: Arc<dyn SmsTransport>,
    config: Arc<RwLock<Option<SmsProviderConfig>>>,
}

impl SmsClient {
    #[must_use]
    pub fn new(transport: Arc<dyn SmsTransport>) -> Self {
        Self {
            transport,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Validate and install the configuration.
    ///
    /// # Errors
    /// `Validation` when the configuration is rejected.
    pub async fn initialize(&self, config: SmsProviderConfig) -> Result<(), ProviderError> {
        config.validate()?;
        *self.config.write().await = Some(config);
        Ok(())
    }

    async fn config(&self) -> Result<SmsProviderConfig, ProviderError> {
        self.config
            .read()
            .await
            .clone()
            .ok_or(ProviderError::NotInitialized)
    }

    /// The configured sender number, normalized to E.164.
    ///
    /// # Errors
    /// `NotInitialized` before `initialize`.
    pub async fn from_number(&self) -> Result<String, ProviderError> {
        Ok(address::format_e164(&self.config().await?.from_number))
    }

    /// Send an SMS.
    ///
    /// Invalid recipient numbers are trimmed from the request; if none
    /// remain the send fails without a provider call. Overlong bodies are
    /// truncated to the concatenated-SMS limit and the truncation is logged.
    ///
    /// # Errors
    /// `Validation` on empty recipients, empty body, or no valid recipients
    /// remaining; `NotInitialized` before `initialize`; transport errors
    /// otherwise.
    pub async fn send_sms(
        &self,
        request: &SendSmsRequest,
    ) -> Result<SendSmsResponse, ProviderError> {
        let config = self.config().await?;

        if request.to.is_empty() {
            return Err(ProviderError::Validation(
                "at least one recipient is required".to_string(),
            ));
        }
        if request.message.is_empty() {
            return Err(ProviderError::Validation(
                "message body must not be empty".to_string(),
            ));
        }

        let valid: Vec<String> = request
            .to
            .iter()
            .filter(|number| {
                let ok = address::is_valid_us_phone(number);
                if !ok {
                    warn!(number = %number, "Dropping invalid SMS recipient");
                }
                ok
            })
            .map(|number| address::format_e164(number))
            .collect();

        if valid.is_empty() {
            return Err(ProviderError::Validation(
                "no valid recipients remain after normalization".to_string(),
            ));
        }

        let message = if request.message.len() > CONCAT_SMS_MAX_BYTES {
            warn!(
                original_bytes = request.message.len(),
                max_bytes = CONCAT_SMS_MAX_BYTES,
                "Truncating overlong SMS body"
            );
            truncate_message(&request.message, CONCAT_SMS_MAX_BYTES)
        } else {
            request.message.clone()
        };

        let wire_request = SendSmsRequest {
            from: address::format_e164(&request.from),
            to: valid,
            message,
            delivery_report_enabled: request.delivery_report_enabled,
            tags: request.tags.clone(),
        };

        let response = tokio::time::timeout(
            Duration::from_secs(config.request_timeout_secs),
            self.transport.send(&wire_request),
        )
        .await
        .map_err(|_| {
            ProviderError::Transient(TransientError::Timeout(format!(
                "SMS send exceeded {}s",
                config.request_timeout_secs
            )))
        })??;

        debug!(
            provider_message_id = %response.message_id,
            recipients = response.to.len(),
            "SMS handed to provider"
        );
        Ok(response)
    }

    /// Fetch the delivery report for a provider message id.
    ///
    /// # Errors
    /// `Validation` on an empty id; `NotInitialized` before `initialize`.
    pub async fn get_delivery_status(
        &self,
        message_id: &str,
    ) -> Result<SmsDeliveryReport, ProviderError> {
        let config = self.config().await?;

        if message_id.is_empty() {
            return Err(ProviderError::Validation(
                "message id must not be empty".to_string(),
            ));
        }

        tokio::time::timeout(
            Duration::from_secs(config.request_timeout_secs),
            self.transport.delivery_status(message_id),
        )
        .await
        .map_err(|_| {
            ProviderError::Transient(TransientError::Timeout(
                "delivery status query timed out".to_string(),
            ))
        })?
    }

    /// Probe the provider. Fails before `initialize` has completed.
    ///
    /// # Errors
    /// `NotInitialized` pre-init; transport errors otherwise.
    pub async fn health_check(&self) -> Result<(), ProviderError> {
        let _ = self.config().await?;
        self.transport.probe().await
    }
}
