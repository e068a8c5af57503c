//! The SMS channel handler.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use herald_common::context::CorrelationContext;
use herald_common::{Channel, DomainError, EventKind, Signal, address, tracing};
use herald_provider::{SendSmsRequest, SmsClient, SmsProviderConfig, SmsTransport};
use herald_route::render_sms;
use herald_status::{DeliveryStatus, MessageContent, MessageId, NotificationMessage};
use herald_subscriber::SubscriberId;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::config::ChannelConfig;
use crate::dead_letter::{DeadLetterQueue, SMS_PROCESSING_FAILED};
use crate::handler::{
    HandlerEnv, HandlerHealth, OutcomeRecorder, eligible_retries, provider_to_domain,
    validate_retryable,
};
use crate::queue::{NotificationQueue, QueueHandler, QueueMessage, SmsNotificationRequest};
use crate::retry::RetryPolicy;
use crate::worker::{WorkProcessor, WorkerPool, WorkerPoolConfig};

/// A unit of SMS work.
#[derive(Debug)]
pub enum SmsJob {
    /// A freshly consumed queue request.
    Fresh(SmsNotificationRequest),
    /// A retry of a persisted, failed message.
    Retry(MessageId),
}

pub(crate) struct SmsProcessor {
    env: HandlerEnv,
    config: ChannelConfig,
    policy: RetryPolicy,
    client: SmsClient,
}

impl SmsProcessor {
    const fn recorder(&self) -> OutcomeRecorder<'_> {
        OutcomeRecorder {
            env: &self.env,
            policy: self.policy,
            dead_letter_enabled: self.config.dead_letter_enabled,
            reason_tag: SMS_PROCESSING_FAILED,
        }
    }

    fn dead_letter_request(&self, worker_id: usize, request: &SmsNotificationRequest, error: &str) {
        if self.config.dead_letter_enabled {
            self.env.dead_letters.record(
                serde_json::to_value(request).unwrap_or(Value::Null),
                error,
                worker_id,
                SMS_PROCESSING_FAILED,
            );
        }
    }

    async fn handle_fresh(&self, worker_id: usize, request: SmsNotificationRequest) {
        let correlation = CorrelationContext::ensure(
            request.correlation_id.as_deref(),
            self.env.environment.clone(),
        );

        let subscriber_id = match SubscriberId::parse(&request.subscriber_id) {
            Ok(id) => id,
            Err(error) => {
                self.dead_letter_request(worker_id, &request, &error.to_string());
                return;
            }
        };

        let recipients: Vec<String> = request
            .recipients
            .iter()
            .filter(|recipient| address::is_valid_us_phone(recipient))
            .map(|recipient| address::format_e164(recipient))
            .collect();
        if recipients.is_empty() {
            self.dead_letter_request(worker_id, &request, "no valid SMS recipients remain");
            return;
        }

        let kind = request.event_type.parse::<EventKind>().ok();
        let text = render_sms(kind, request.priority, &request.event_data);

        let from = match self.client.from_number().await {
            Ok(from) => from,
            Err(error) => {
                self.dead_letter_request(worker_id, &request, &error.to_string());
                return;
            }
        };

        let message_id = MessageId::generate();
        let message = NotificationMessage {
            message_id,
            subscriber_id,
            event_kind: request.event_type.clone(),
            priority: request.priority,
            recipients: recipients.clone(),
            content: MessageContent::Sms {
                from,
                to: recipients.clone(),
                text,
                tags: HashMap::from([(
                    "correlation_id".to_string(),
                    correlation.correlation_id.clone(),
                )]),
            },
            event_data: request.event_data.clone(),
            correlation_id: correlation.correlation_id,
            created_at: request.created_at,
        };

        let status = DeliveryStatus::pending(message_id, subscriber_id, &recipients);
        if let Err(error) = self.env.status_store.save_message(&message).await {
            tracing::error!(message_id = %message_id, error = %error, "Failed to persist message");
            return;
        }
        if let Err(error) = self.env.status_store.save_delivery_status(&status).await {
            tracing::error!(message_id = %message_id, error = %error, "Failed to persist status");
            return;
        }

        self.attempt_send(worker_id, &message, 1).await;
    }

    async fn attempt_send(&self, worker_id: usize, message: &NotificationMessage, attempt: u32) {
        let MessageContent::Sms {
            from, to, text, tags,
        } = &message.content
        else {
            tracing::error!(message_id = %message.message_id, "SMS worker given non-SMS content");
            return;
        };

        let recorder = self.recorder();
        let request = SendSmsRequest {
            from: from.clone(),
            to: to.clone(),
            message: text.clone(),
            delivery_report_enabled: true,
            tags: tags.clone(),
        };

        match self.client.send_sms(&request).await {
            Ok(response) => {
                tracing::debug!(
                    message_id = %message.message_id,
                    provider_message_id = %response.message_id,
                    attempt,
                    accepted = response.to.iter().filter(|result| result.successful).count(),
                    "SMS sent"
                );
                recorder.success(message.message_id, attempt).await;
            }
            Err(error) => {
                recorder
                    .failure(
                        worker_id,
                        message.message_id,
                        attempt,
                        &error,
                        serde_json::to_value(message).unwrap_or(Value::Null),
                    )
                    .await;
            }
        }
    }

    /// Re-send a persisted message, used by the sweep and the operator
    /// retry surface.
    pub(crate) async fn resend(&self, worker_id: usize, message_id: MessageId) {
        let status = match validate_retryable(&self.env, self.policy, message_id).await {
            Ok(status) => status,
            Err(error) => {
                tracing::debug!(message_id = %message_id, error = %error, "Retry skipped");
                return;
            }
        };

        let message = match self.env.status_store.get_message(message_id).await {
            Ok(message) => message,
            Err(error) => {
                tracing::error!(message_id = %message_id, error = %error, "Retry lost its message");
                return;
            }
        };

        self.attempt_send(worker_id, &message, status.attempt_count + 1)
            .await;
    }
}

#[async_trait]
impl WorkProcessor for SmsProcessor {
    type Job = SmsJob;

    async fn process(&self, worker_id: usize, job: SmsJob) {
        match job {
            SmsJob::Fresh(request) => self.handle_fresh(worker_id, request).await,
            SmsJob::Retry(message_id) => self.resend(worker_id, message_id).await,
        }
    }

    async fn maintenance(&self, worker_id: usize) {
        if let Err(error) = self.client.health_check().await {
            tracing::warn!(worker_id, error = %error, "SMS provider health probe failed");
        }
    }

    async fn retry_sweep(&self) {
        let eligible = eligible_retries(&self.env, self.policy, self.config.batch_size).await;
        if eligible.is_empty() {
            return;
        }

        tracing::info!(count = eligible.len(), "SMS retry sweep issuing retries");
        for message_id in eligible {
            self.resend(self.config.workers, message_id).await;
        }
    }
}

/// The long-lived SMS handler service.
pub struct SmsHandlerService {
    config: ChannelConfig,
    processor: Arc<SmsProcessor>,
    pool: Arc<WorkerPool<SmsProcessor>>,
    queue: Arc<dyn NotificationQueue>,
    shutdown: broadcast::Sender<Signal>,
}

impl SmsHandlerService {
    /// Start the service: validate config, initialize the provider client,
    /// spawn the workers, subscribe to the channel queue.
    ///
    /// # Errors
    /// `Validation` on bad configuration; queue errors from subscription.
    pub async fn start(
        config: ChannelConfig,
        provider_config: SmsProviderConfig,
        transport: Arc<dyn SmsTransport>,
        queue: Arc<dyn NotificationQueue>,
        env: HandlerEnv,
    ) -> Result<Self, DomainError> {
        config.validate(Channel::Sms)?;

        let client = SmsClient::new(transport);
        client
            .initialize(provider_config)
            .await
            .map_err(provider_to_domain)?;

        let policy = RetryPolicy {
            max_retries: config.max_retries,
            retry_delay_secs: config.retry_delay_secs,
        };
        let processor = Arc::new(SmsProcessor {
            env,
            config: config.clone(),
            policy,
            client,
        });

        let (shutdown, _) = broadcast::channel(8);
        let pool = Arc::new(WorkerPool::start(
            &WorkerPoolConfig::from_channel(&config, Channel::Sms),
            Arc::clone(&processor),
            &shutdown,
        ));

        let handler = subscription_handler(
            Arc::clone(&pool),
            Arc::clone(&processor.env.dead_letters),
            config.dead_letter_enabled,
        );
        queue.subscribe(&config.queue_name, handler).await?;

        tracing::info!(queue = %config.queue_name, "SMS handler started");

        Ok(Self {
            config,
            processor,
            pool,
            queue,
            shutdown,
        })
    }

    /// Stop accepting work, drain in-flight jobs, and join the pool.
    ///
    /// # Errors
    /// Queue errors from unsubscription.
    pub async fn stop(&self) -> Result<(), DomainError> {
        self.queue.unsubscribe(&self.config.queue_name).await?;
        let _ = self.shutdown.send(Signal::Shutdown);
        self.pool.join(self.config.shutdown_grace()).await;
        tracing::info!("SMS handler stopped");
        Ok(())
    }

    /// Current delivery status for a message.
    ///
    /// # Errors
    /// `NotFound` when the message is unknown.
    pub async fn get_delivery_status(
        &self,
        message_id: MessageId,
    ) -> Result<DeliveryStatus, DomainError> {
        self.processor
            .env
            .status_store
            .get_delivery_status(message_id)
            .await
    }

    /// Operator-requested retry of a failed message. The retry runs on the
    /// worker pool, FIFO with other work.
    ///
    /// # Errors
    /// `Validation` when the message is final-but-not-failed or its attempts
    /// are exhausted; `NotFound` when it is unknown.
    pub async fn retry_failed_message(&self, message_id: MessageId) -> Result<(), DomainError> {
        validate_retryable(&self.processor.env, self.processor.policy, message_id).await?;
        self.pool.enqueue(SmsJob::Retry(message_id)).await
    }

    /// Aggregate component health.
    pub async fn health(&self) -> HandlerHealth {
        HandlerHealth {
            repository: self.processor.env.status_store.health_check().await.is_ok(),
            provider: self.processor.client.health_check().await.is_ok(),
            queue: self.queue.health_check().await.is_ok(),
            workers: !self.pool.is_stopping(),
        }
    }

    /// Jobs completed since start.
    #[must_use]
    pub fn processed_count(&self) -> u64 {
        self.pool.processed_count()
    }

    /// The shared dead-letter queue.
    #[must_use]
    pub fn dead_letters(&self) -> Arc<DeadLetterQueue> {
        Arc::clone(&self.processor.env.dead_letters)
    }
}

fn subscription_handler(
    pool: Arc<WorkerPool<SmsProcessor>>,
    dead_letters: Arc<DeadLetterQueue>,
    dead_letter_enabled: bool,
) -> QueueHandler {
    Arc::new(move |message: QueueMessage| {
        let pool = Arc::clone(&pool);
        let dead_letters = Arc::clone(&dead_letters);
        Box::pin(async move {
            match serde_json::from_slice::<SmsNotificationRequest>(&message.data) {
                Ok(mut request) => {
                    if request.correlation_id.is_none() {
                        request.correlation_id = message.correlation_id;
                    }
                    // Enqueue failures (backpressure) propagate to the
                    // publisher for consumer-side throttling
                    pool.enqueue(SmsJob::Fresh(request)).await
                }
                Err(error) => {
                    // Undecodable payloads are permanent
                    if dead_letter_enabled {
                        dead_letters.record(
                            serde_json::json!({ "queue_message_id": message.id }),
                            error.to_string(),
                            0,
                            SMS_PROCESSING_FAILED,
                        );
                    }
                    Ok(())
                }
            }
        })
    })
}
