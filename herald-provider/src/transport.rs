//! Wire transports behind the provider clients.
//!
//! The clients own validation, truncation, and lifecycle; transports only
//! move bytes. The in-memory implementations record every request and can be
//! scripted to fail, which is how the retry and dead-letter paths are
//! exercised in tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::email::{EmailDeliveryReport, SendEmailRequest, SendEmailResponse};
use crate::error::ProviderError;
use crate::sms::{
    SendSmsRequest, SendSmsResponse, SmsDeliveryReport, SmsDeliveryStatusDetails,
    SmsRecipientResult,
};

/// Email wire transport.
#[async_trait]
pub trait EmailTransport: Send + Sync + std::fmt::Debug {
    async fn send(&self, request: &SendEmailRequest) -> Result<SendEmailResponse, ProviderError>;

    async fn delivery_status(
        &self,
        message_id: &str,
    ) -> Result<EmailDeliveryReport, ProviderError>;

    async fn probe(&self) -> Result<(), ProviderError>;
}

/// SMS wire transport.
#[async_trait]
pub trait SmsTransport: Send + Sync + std::fmt::Debug {
    async fn send(&self, request: &SendSmsRequest) -> Result<SendSmsResponse, ProviderError>;

    async fn delivery_status(&self, message_id: &str)
    -> Result<SmsDeliveryReport, ProviderError>;

    async fn probe(&self) -> Result<(), ProviderError>;
}

/// In-memory email transport for tests and single-node runs.
#[derive(Debug, Default)]
pub struct MemoryEmailTransport {
    sent: Mutex<Vec<SendEmailRequest>>,
    scripted_failures: Mutex<VecDeque<ProviderError>>,
}

impl MemoryEmailTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error to be returned by the next send.
    pub fn push_failure(&self, error: ProviderError) {
        self.scripted_failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(error);
    }

    /// Every request that reached the wire, in order.
    pub fn sent(&self) -> Vec<SendEmailRequest> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn next_failure(&self) -> Option<ProviderError> {
        self.scripted_failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
    }
}

#[async_trait]
impl EmailTransport for MemoryEmailTransport {
    async fn send(&self, request: &SendEmailRequest) -> Result<SendEmailResponse, ProviderError> {
        if let Some(error) = self.next_failure() {
            return Err(error);
        }

        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.clone());

        Ok(SendEmailResponse {
            message_id: Uuid::new_v4().to_string(),
            status: "queued".to_string(),
        })
    }

    async fn delivery_status(
        &self,
        message_id: &str,
    ) -> Result<EmailDeliveryReport, ProviderError> {
        Ok(EmailDeliveryReport {
            message_id: message_id.to_string(),
            status: "delivered".to_string(),
            timestamp: Utc::now(),
        })
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// In-memory SMS transport for tests and single-node runs.
#[derive(Debug, Default)]
pub struct MemorySmsTransport {
    sent: Mutex<Vec<SendSmsRequest>>,
    scripted_failures: Mutex<VecDeque<ProviderError>>,
}

impl MemorySmsTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error to be returned by the next send.
    pub fn push_failure(&self, error: ProviderError) {
        self.scripted_failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(error);
    }

    /// Every request that reached the wire, in order.
    pub fn sent(&self) -> Vec<SendSmsRequest> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn next_failure(&self) -> Option<ProviderError> {
        self.scripted_failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
    }
}

#[async_trait]
impl SmsTransport for MemorySmsTransport {
    async fn send(&self, request: &SendSmsRequest) -> Result<SendSmsResponse, ProviderError> {
        if let Some(error) = self.next_failure() {
            return Err(error);
        }

        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.clone());

        let batch_id = Uuid::new_v4().to_string();
        Ok(SendSmsResponse {
            message_id: batch_id,
            to: request
                .to
                .iter()
                .map(|recipient| SmsRecipientResult {
                    to: recipient.clone(),
                    message_id: Uuid::new_v4().to_string(),
                    http_status_code: 202,
                    successful: true,
                    repeatability_result: Some("accepted".to_string()),
                })
                .collect(),
        })
    }

    async fn delivery_status(
        &self,
        message_id: &str,
    ) -> Result<SmsDeliveryReport, ProviderError> {
        Ok(SmsDeliveryReport {
            message_id: message_id.to_string(),
            from: String::new(),
            to: String::new(),
            delivery_status: "delivered".to_string(),
            delivery_status_details: SmsDeliveryStatusDetails {
                status_message: "Delivered".to_string(),
                timestamp: Utc::now(),
            },
            received_timestamp: Utc::now(),
        })
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
