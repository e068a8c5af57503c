//! The dispatcher: ingress events to channel queues.
//!
//! Classifies each event, asks the router for the delivery set, buckets
//! hourly/daily subscribers into their windows, and publishes everything
//! else straight onto the channel queues. Enqueue backpressure surfaces to
//! the caller as an error, which the event-bus consumer translates into
//! consumer-side throttling.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use herald_common::context::CorrelationContext;
use herald_common::{Channel, DomainError, DomainEvent, Signal, internal};
use herald_dispatch::{
    EmailNotificationRequest, NotificationQueue, QueueMessage, SmsNotificationRequest,
};
use herald_route::{ClassifiedEvent, PendingNotification, Router, ScheduledQueue};
use herald_subscriber::SubscriberStore;
use tracing::{debug, error};
use uuid::Uuid;

/// Routes classified events into the channel queues.
pub struct Dispatcher {
    router: Router,
    scheduled: ScheduledQueue,
    queue: Arc<dyn NotificationQueue>,
    email_queue_name: String,
    sms_queue_name: String,
    environment: String,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        subscribers: Arc<dyn SubscriberStore>,
        queue: Arc<dyn NotificationQueue>,
        email_queue_name: impl Into<String>,
        sms_queue_name: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            router: Router::new(subscribers),
            scheduled: ScheduledQueue::new(),
            queue,
            email_queue_name: email_queue_name.into(),
            sms_queue_name: sms_queue_name.into(),
            environment: environment.into(),
        }
    }

    /// Classify and route one ingress event.
    ///
    /// Returns the number of notifications published immediately; windowed
    /// notifications are held until [`Self::flush_due`].
    ///
    /// # Errors
    /// Store failures and queue backpressure propagate to the caller.
    pub async fn dispatch(&self, event: DomainEvent) -> Result<usize, DomainError> {
        let correlation = CorrelationContext::ensure(
            event.correlation_id.as_deref(),
            self.environment.clone(),
        );

        let classified = ClassifiedEvent::from_event(event);
        let tuples = self.router.compute_routes(&classified).await?;

        debug!(
            event_id = %classified.event.event_id,
            kind = %classified.kind,
            priority = %classified.priority,
            routes = tuples.len(),
            "Event routed"
        );

        let now = Utc::now();
        let mut published = 0;
        for route in tuples {
            let pending = PendingNotification {
                route,
                kind: classified.kind,
                priority: classified.priority,
                data: classified.event.data.clone(),
                correlation_id: correlation.correlation_id.clone(),
                created_at: now,
            };

            if let Some(immediate) = self.scheduled.add(pending, now) {
                self.publish(immediate).await?;
                published += 1;
            }
        }

        Ok(published)
    }

    /// Publish every windowed notification whose window has closed.
    ///
    /// # Errors
    /// Queue backpressure propagates; already drained notifications are not
    /// re-queued.
    pub async fn flush_due(&self, now: DateTime<Utc>) -> Result<usize, DomainError> {
        let due = self.scheduled.drain_due(now);
        let mut published = 0;
        for notification in due {
            self.publish(notification).await?;
            published += 1;
        }
        Ok(published)
    }

    /// Notifications currently held in windows.
    #[must_use]
    pub fn scheduled_len(&self) -> usize {
        self.scheduled.len()
    }

    async fn publish(&self, notification: PendingNotification) -> Result<(), DomainError> {
        let correlation_id = notification.correlation_id.clone();
        let subscriber_id = notification.route.subscriber_id.to_string();
        let event_type = notification.kind.as_str().to_string();

        let (queue_name, message) = match notification.route.channel {
            Channel::Email => {
                let request = EmailNotificationRequest {
                    subscriber_id,
                    event_type,
                    priority: notification.priority,
                    recipients: vec![notification.route.recipient.clone()],
                    event_data: notification.data.clone(),
                    schedule: None,
                    created_at: notification.created_at,
                    correlation_id: Some(correlation_id.clone()),
                };
                (
                    self.email_queue_name.as_str(),
                    QueueMessage::from_payload(
                        Uuid::new_v4().to_string(),
                        &request,
                        Some(correlation_id),
                    )?,
                )
            }
            Channel::Sms => {
                let request = SmsNotificationRequest {
                    subscriber_id,
                    event_type,
                    priority: notification.priority,
                    recipients: vec![notification.route.recipient.clone()],
                    event_data: notification.data.clone(),
                    schedule: None,
                    created_at: notification.created_at,
                    correlation_id: Some(correlation_id.clone()),
                };
                (
                    self.sms_queue_name.as_str(),
                    QueueMessage::from_payload(
                        Uuid::new_v4().to_string(),
                        &request,
                        Some(correlation_id),
                    )?,
                )
            }
        };

        self.queue.publish(queue_name, message).await
    }

    /// Run the window flush loop until shutdown.
    ///
    /// # Errors
    /// Currently always returns `Ok`; flush failures are logged and retried
    /// on the next tick.
    pub async fn serve(
        self: Arc<Self>,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
        flush_interval: Duration,
    ) -> Result<(), DomainError> {
        internal!("Dispatcher flush loop starting");

        let mut timer = tokio::time::interval(flush_interval);
        timer.tick().await;

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    match self.flush_due(Utc::now()).await {
                        Ok(count) if count > 0 => {
                            debug!(count, "Flushed due delivery windows");
                        }
                        Ok(_) => {}
                        Err(flush_error) => {
                            error!(error = %flush_error, "Window flush failed");
                        }
                    }
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) | Err(_) => {
                            internal!("Dispatcher flush loop shutting down");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("email_queue", &self.email_queue_name)
            .field("sms_queue", &self.sms_queue_name)
            .field("scheduled", &self.scheduled.len())
            .finish_non_exhaustive()
    }
}
