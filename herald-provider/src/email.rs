//! The email provider client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use herald_common::address;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ProviderError, TransientError};
use crate::transport::EmailTransport;

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_retries() -> u32 {
    3
}

/// Email provider configuration, validated at `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailProviderConfig {
    pub connection_string: String,
    pub sender_address: String,
    #[serde(default)]
    pub reply_to_address: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl EmailProviderConfig {
    /// Validate at initialization time.
    ///
    /// # Errors
    /// `Validation` on an empty connection string or a missing/invalid
    /// sender address.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.connection_string.trim().is_empty() {
            return Err(ProviderError::Validation(
                "connection string must not be empty".to_string(),
            ));
        }
        if !address::is_valid_email(&self.sender_address) {
            return Err(ProviderError::Validation(format!(
                "sender address is not a valid email: {:?}",
                self.sender_address
            )));
        }
        Ok(())
    }
}

/// Recipient block of a send request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecipients {
    pub to: Vec<String>,
}

/// Content block of a send request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailBody {
    pub subject: String,
    pub html: String,
    pub plain_text: String,
}

/// A send request as handed to the wire transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEmailRequest {
    pub sender_address: String,
    pub recipients: EmailRecipients,
    pub content: EmailBody,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub attachment_ids: Vec<String>,
}

/// Provider-side acknowledgement of a send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailResponse {
    pub message_id: String,
    pub status: String,
}

/// Provider-side delivery report for a previously sent message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailDeliveryReport {
    pub message_id: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Typed wrapper over the external email API.
///
/// Created once at service start; `initialize` must complete before the
/// first send. All calls run under the configured request deadline.
#[derive(Debug, Clone)]
pub struct EmailClient {
    transport: Arc<dyn EmailTransport>,
    config: Arc<RwLock<Option<EmailProviderConfig>>>,
}

impl EmailClient {
    #[must_use]
    pub fn new(transport: Arc<dyn EmailTransport>) -> Self {
        Self {
            transport,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Validate and install the configuration.
    ///
    /// # Errors
    /// `Validation` when the configuration is rejected.
    pub async fn initialize(&self, config: EmailProviderConfig) -> Result<(), ProviderError> {
        config.validate()?;
        *self.config.write().await = Some(config);
        Ok(())
    }

    async fn config(&self) -> Result<EmailProviderConfig, ProviderError> {
        self.config
            .read()
            .await
            .clone()
            .ok_or(ProviderError::NotInitialized)
    }

    /// The configured sender address.
    ///
    /// # Errors
    /// `NotInitialized` before `initialize`.
    pub async fn sender_address(&self) -> Result<String, ProviderError> {
        Ok(self.config().await?.sender_address)
    }

    /// The configured reply-to address, if any.
    ///
    /// # Errors
    /// `NotInitialized` before `initialize`.
    pub async fn reply_to_address(&self) -> Result<Option<String>, ProviderError> {
        Ok(self.config().await?.reply_to_address)
    }

    /// Send an email.
    ///
    /// # Errors
    /// `Validation` on empty recipients or an empty body; `NotInitialized`
    /// before `initialize`; transport errors otherwise.
    pub async fn send_email(
        &self,
        request: &SendEmailRequest,
    ) -> Result<SendEmailResponse, ProviderError> {
        let config = self.config().await?;

        if request.recipients.to.is_empty() {
            return Err(ProviderError::Validation(
                "at least one recipient is required".to_string(),
            ));
        }
        if request.content.plain_text.is_empty() && request.content.html.is_empty() {
            return Err(ProviderError::Validation(
                "email body must not be empty".to_string(),
            ));
        }

        let response = tokio::time::timeout(
            Duration::from_secs(config.timeout_secs),
            self.transport.send(request),
        )
        .await
        .map_err(|_| {
            ProviderError::Transient(TransientError::Timeout(format!(
                "email send exceeded {}s",
                config.timeout_secs
            )))
        })??;

        debug!(
            provider_message_id = %response.message_id,
            recipients = request.recipients.to.len(),
            "Email handed to provider"
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
    ) -> Result<EmailDeliveryReport, ProviderError> {
        let config = self.config().await?;

        if message_id.is_empty() {
            return Err(ProviderError::Validation(
                "message id must not be empty".to_string(),
            ));
        }

        tokio::time::timeout(
            Duration::from_secs(config.timeout_secs),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryEmailTransport;

    fn config() -> EmailProviderConfig {
        EmailProviderConfig {
            connection_string: "endpoint=https://mail.example.com;key=secret".to_string(),
            sender_address: "noreply@example.com".to_string(),
            reply_to_address: Some("support@example.com".to_string()),
            timeout_secs: 5,
            max_retries: 3,
        }
    }

    fn request(to: &[&str]) -> SendEmailRequest {
        SendEmailRequest {
            sender_address: "noreply@example.com".to_string(),
            recipients: EmailRecipients {
                to: to.iter().map(ToString::to_string).collect(),
            },
            content: EmailBody {
                subject: "Subject".to_string(),
                html: "<p>body</p>".to_string(),
                plain_text: "body".to_string(),
            },
            headers: HashMap::new(),
            reply_to: None,
            attachment_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_initialize_rejects_bad_config() {
        let client = EmailClient::new(Arc::new(MemoryEmailTransport::new()));

        let mut bad = config();
        bad.connection_string = "  ".to_string();
        assert!(client.initialize(bad).await.unwrap_err().is_validation());

        let mut bad = config();
        bad.sender_address = "not-an-address".to_string();
        assert!(client.initialize(bad).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_health_check_requires_initialize() {
        let client = EmailClient::new(Arc::new(MemoryEmailTransport::new()));
        assert!(matches!(
            client.health_check().await,
            Err(ProviderError::NotInitialized)
        ));

        client.initialize(config()).await.unwrap();
        client.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_validates_request() {
        let transport = Arc::new(MemoryEmailTransport::new());
        let client = EmailClient::new(transport.clone());
        client.initialize(config()).await.unwrap();

        let err = client.send_email(&request(&[])).await.unwrap_err();
        assert!(err.is_validation());

        let mut empty_body = request(&["user@example.com"]);
        empty_body.content.html.clear();
        empty_body.content.plain_text.clear();
        let err = client.send_email(&empty_body).await.unwrap_err();
        assert!(err.is_validation());

        // No request reached the wire
        assert_eq!(transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_send_happy_path() {
        let transport = Arc::new(MemoryEmailTransport::new());
        let client = EmailClient::new(transport.clone());
        client.initialize(config()).await.unwrap();

        let response = client
            .send_email(&request(&["user@example.com"]))
            .await
            .unwrap();
        assert!(!response.message_id.is_empty());
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_delivery_status_rejects_empty_id() {
        let client = EmailClient::new(Arc::new(MemoryEmailTransport::new()));
        client.initialize(config()).await.unwrap();

        let err = client.get_delivery_status("").await.unwrap_err();
        assert!(err.is_validation());
    }
}
