//! Channel handler services.
//!
//! One service per channel. Both share the same skeleton: subscribe to the
//! channel queue, decode requests, hand them to the worker pool; each job
//! renders, persists, sends, and applies the retry policy. The shared
//! machinery lives here; the email and SMS specifics live in their modules.
//!
//! Workers receive their dependencies through [`HandlerEnv`], a value-typed
//! environment, so they never hold an owning reference back to the service.

pub mod email;
pub mod sms;

use std::sync::Arc;

use chrono::Utc;
use herald_common::audit::{AuditEvent, AuditOperation, SharedAuditSink};
use herald_common::{DomainError, tracing};
use herald_provider::ProviderError;
use herald_status::{DeliveryStatus, MessageId, OverallStatus, StatusStore};
use serde_json::Value;

use crate::dead_letter::DeadLetterQueue;
use crate::retry::{FaultClass, RetryPolicy, final_status_for};

/// Shared dependencies handed to every worker at construction.
#[derive(Clone)]
pub struct HandlerEnv {
    pub status_store: Arc<dyn StatusStore>,
    pub dead_letters: Arc<DeadLetterQueue>,
    pub audit: Option<SharedAuditSink>,
    pub environment: String,
}

impl std::fmt::Debug for HandlerEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerEnv")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

/// Aggregate component health of one handler service.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct HandlerHealth {
    pub repository: bool,
    pub provider: bool,
    pub queue: bool,
    pub workers: bool,
}

impl HandlerHealth {
    /// The service is unhealthy if any component is.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.repository && self.provider && self.queue && self.workers
    }
}

/// Translate a provider error into the domain taxonomy.
pub(crate) fn provider_to_domain(error: ProviderError) -> DomainError {
    let domain = match &error {
        ProviderError::Validation(_) => DomainError::validation(error.to_string()),
        ProviderError::RateLimited(_) => DomainError::rate_limit(error.to_string()),
        _ => DomainError::dependency(error.to_string()),
    };
    domain.with_source(error)
}

/// Records send outcomes into the status store, the dead-letter queue, and
/// the audit sink.
pub(crate) struct OutcomeRecorder<'a> {
    pub env: &'a HandlerEnv,
    pub policy: RetryPolicy,
    pub dead_letter_enabled: bool,
    pub reason_tag: &'static str,
}

impl OutcomeRecorder<'_> {
    /// Persist a successful send: `sent` overall, one `sent` entry per
    /// recipient.
    pub async fn success(&self, message_id: MessageId, attempt: u32) {
        let mut status = match self.env.status_store.get_delivery_status(message_id).await {
            Ok(status) => status,
            Err(error) => {
                tracing::error!(message_id = %message_id, error = %error, "Status row missing on success");
                return;
            }
        };

        status.overall_status = OverallStatus::Sent;
        status.attempt_count = attempt;
        status.last_attempt_at = Some(Utc::now());
        status.error_message = None;
        status.next_retry_at = None;
        for recipient in &mut status.recipients {
            recipient.status = OverallStatus::Sent;
            recipient.error_message = None;
        }

        if let Err(error) = self.env.status_store.update_delivery_status(status).await {
            tracing::error!(message_id = %message_id, error = %error, "Failed to persist sent status");
            return;
        }

        self.publish_audit(message_id, AuditOperation::Publish, "sent");
    }

    /// Persist a failed send and decide retry versus dead-letter.
    pub async fn failure(
        &self,
        worker_id: usize,
        message_id: MessageId,
        attempt: u32,
        error: &ProviderError,
        original_request: Value,
    ) {
        let mut status = match self.env.status_store.get_delivery_status(message_id).await {
            Ok(status) => status,
            Err(store_error) => {
                tracing::error!(
                    message_id = %message_id,
                    error = %store_error,
                    "Status row missing on failure"
                );
                return;
            }
        };

        let now = Utc::now();
        status.attempt_count = attempt;
        status.last_attempt_at = Some(now);
        status.error_message = Some(error.to_string());

        let fault = FaultClass::of(error);
        let dead_letter = if fault.dead_letters_immediately() {
            status.overall_status = final_status_for(error);
            status.next_retry_at = None;
            true
        } else {
            status.overall_status = OverallStatus::Failed;
            if self.policy.should_retry(attempt) {
                status.next_retry_at = Some(self.policy.next_retry_at(attempt, now));
                false
            } else {
                status.next_retry_at = None;
                true
            }
        };

        let final_status = status.overall_status;
        for recipient in &mut status.recipients {
            recipient.status = final_status;
            recipient.error_message = Some(error.to_string());
        }

        tracing::warn!(
            message_id = %message_id,
            attempt,
            status = %final_status,
            retry_scheduled = status.next_retry_at.is_some(),
            error = %error,
            "Send attempt failed"
        );

        if let Err(store_error) = self.env.status_store.update_delivery_status(status).await {
            tracing::error!(
                message_id = %message_id,
                error = %store_error,
                "Failed to persist failure status"
            );
        }

        if dead_letter {
            if self.dead_letter_enabled {
                self.env.dead_letters.record(
                    original_request,
                    error.to_string(),
                    worker_id,
                    self.reason_tag,
                );
            }
            self.publish_audit(message_id, AuditOperation::Update, final_status.as_str());
        }
    }

    fn publish_audit(&self, message_id: MessageId, operation: AuditOperation, outcome: &str) {
        let Some(sink) = &self.env.audit else { return };
        let event = AuditEvent::new(
            "notification_message",
            message_id.to_string(),
            operation,
            self.env.environment.clone(),
        )
        .with_snapshot(None, Some(serde_json::json!({ "outcome": outcome })));
        sink.publish(&event);
    }
}

/// Failed statuses whose retry time has arrived and whose attempts are not
/// exhausted, bounded by `batch`.
pub(crate) async fn eligible_retries(
    env: &HandlerEnv,
    policy: RetryPolicy,
    batch: usize,
) -> Vec<MessageId> {
    let failed = match env.status_store.get_failed_messages(batch).await {
        Ok(failed) => failed,
        Err(error) => {
            tracing::error!(error = %error, "Retry sweep could not list failed messages");
            return Vec::new();
        }
    };

    let now = Utc::now();
    failed
        .into_iter()
        .filter(|status| {
            status.next_retry_at.is_some_and(|at| at <= now)
                && policy.should_retry(status.attempt_count)
        })
        .map(|status| status.message_id)
        .collect()
}

/// Validate an operator-requested retry.
///
/// # Errors
/// `NotFound` when no status exists; `Validation` when the status is not
/// `failed` or its attempts are exhausted.
pub(crate) async fn validate_retryable(
    env: &HandlerEnv,
    policy: RetryPolicy,
    message_id: MessageId,
) -> Result<DeliveryStatus, DomainError> {
    let status = env.status_store.get_delivery_status(message_id).await?;

    if !status.overall_status.is_retryable() {
        return Err(DomainError::validation(format!(
            "message is {} and cannot be retried",
            status.overall_status
        ))
        .with_field("overall_status", status.overall_status.as_str()));
    }

    if !policy.should_retry(status.attempt_count) {
        return Err(DomainError::validation("retry attempts are exhausted")
            .with_field("attempt_count", status.attempt_count.to_string()));
    }

    Ok(status)
}
