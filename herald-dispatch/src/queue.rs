//! The channel queue contract and its in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use herald_common::{DomainError, Priority};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A message as carried by the channel queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: String,
    pub data: Vec<u8>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl QueueMessage {
    /// Wrap a JSON-serializable payload.
    ///
    /// # Errors
    /// `Validation` when the payload does not serialize.
    pub fn from_payload<T: Serialize>(
        id: impl Into<String>,
        payload: &T,
        correlation_id: Option<String>,
    ) -> Result<Self, DomainError> {
        let data = serde_json::to_vec(payload).map_err(|error| {
            DomainError::validation("queue payload does not serialize").with_source(error)
        })?;
        Ok(Self {
            id: id.into(),
            data,
            headers: HashMap::new(),
            correlation_id,
            timestamp: Utc::now(),
        })
    }
}

/// Handler invoked for each message on a subscribed queue.
pub type QueueHandler =
    Arc<dyn Fn(QueueMessage) -> BoxFuture<'static, Result<(), DomainError>> + Send + Sync>;

/// Abstract channel queue.
///
/// A handler error returned from the subscription callback propagates to the
/// publisher, which is how worker backpressure reaches the event-bus
/// consumer.
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Deliver a message to the named queue.
    async fn publish(&self, queue_name: &str, message: QueueMessage) -> Result<(), DomainError>;

    /// Register the handler for the named queue.
    async fn subscribe(&self, queue_name: &str, handler: QueueHandler) -> Result<(), DomainError>;

    /// Remove the handler for the named queue.
    async fn unsubscribe(&self, queue_name: &str) -> Result<(), DomainError>;

    /// Probe the queue backend.
    async fn health_check(&self) -> Result<(), DomainError>;
}

/// In-memory queue: publishes run the subscriber inline, so backpressure is
/// immediate and tests are deterministic.
#[derive(Default)]
pub struct MemoryQueue {
    subscribers: DashMap<String, QueueHandler>,
}

impl MemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl std::fmt::Debug for MemoryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryQueue")
            .field("subscriptions", &self.subscribers.len())
            .finish()
    }
}

#[async_trait]
impl NotificationQueue for MemoryQueue {
    async fn publish(&self, queue_name: &str, message: QueueMessage) -> Result<(), DomainError> {
        let handler = self
            .subscribers
            .get(queue_name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                DomainError::dependency(format!("no subscriber on queue {queue_name}"))
            })?;

        handler(message).await
    }

    async fn subscribe(&self, queue_name: &str, handler: QueueHandler) -> Result<(), DomainError> {
        self.subscribers.insert(queue_name.to_string(), handler);
        Ok(())
    }

    async fn unsubscribe(&self, queue_name: &str) -> Result<(), DomainError> {
        self.subscribers.remove(queue_name);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

/// JSON payload consumed by the email handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailNotificationRequest {
    pub subscriber_id: String,
    pub event_type: String,
    pub priority: Priority,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub event_data: Map<String, Value>,
    #[serde(default)]
    pub schedule: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// JSON payload consumed by the SMS handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsNotificationRequest {
    pub subscriber_id: String,
    pub event_type: String,
    pub priority: Priority,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub event_data: Map<String, Value>,
    #[serde(default)]
    pub schedule: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let queue = MemoryQueue::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let handler: QueueHandler = Arc::new(move |_message| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });

        queue.subscribe("notifications-email", handler).await.unwrap();
        queue
            .publish(
                "notifications-email",
                QueueMessage::from_payload("m-1", &serde_json::json!({}), None).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscriber_fails() {
        let queue = MemoryQueue::new();
        let err = queue
            .publish(
                "nowhere",
                QueueMessage::from_payload("m-1", &serde_json::json!({}), None).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(err.is_dependency());
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_handler() {
        let queue = MemoryQueue::new();
        let handler: QueueHandler = Arc::new(|_| Box::pin(async { Ok(()) }));

        queue.subscribe("q", handler).await.unwrap();
        assert_eq!(queue.subscription_count(), 1);

        queue.unsubscribe("q").await.unwrap();
        assert_eq!(queue.subscription_count(), 0);
    }

    #[test]
    fn test_request_decodes_from_json() {
        let raw = serde_json::json!({
            "subscriber_id": "9b2ce3f5-3c3f-4d6f-9c3e-0a5b1c2d3e4f",
            "event_type": "inquiry-business",
            "priority": "high",
            "recipients": ["+12125551234"],
            "event_data": {"entity_id": "biz-001"},
            "created_at": "2026-03-01T12:00:00Z",
            "correlation_id": "corr-1"
        });

        let request: SmsNotificationRequest =
            serde_json::from_value(raw).expect("request should decode");
        assert_eq!(request.priority, Priority::High);
        assert_eq!(request.recipients, vec!["+12125551234".to_string()]);
    }

    #[test]
    fn test_request_missing_fields_is_an_error() {
        let raw = serde_json::json!({"event_type": "inquiry-business"});
        assert!(serde_json::from_value::<EmailNotificationRequest>(raw).is_err());
    }
}
