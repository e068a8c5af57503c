//! In-memory status store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use herald_common::DomainError;
use tokio::sync::RwLock;

use crate::store::StatusStore;
use crate::types::{
    DeliveryStatus, MessageId, NotificationMessage, OverallStatus, can_transition,
};

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Inner {
    /// `BTreeMap` keeps listings ordered by message id, i.e. creation time.
    messages: BTreeMap<MessageId, NotificationMessage>,
    statuses: BTreeMap<MessageId, DeliveryStatus>,
}

/// In-memory [`StatusStore`] implementation.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStatusStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count statuses per overall status, for queue-utilization logging.
    pub async fn count_by_status(&self) -> HashMap<&'static str, usize> {
        let inner = self.inner.read().await;
        let mut counts = HashMap::new();
        for status in inner.statuses.values() {
            *counts.entry(status.overall_status.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Total number of tracked messages.
    pub async fn len(&self) -> usize {
        self.inner.read().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn validate_update(old: &DeliveryStatus, new: &DeliveryStatus) -> Result<(), DomainError> {
    if !can_transition(old.overall_status, new.overall_status) {
        return Err(DomainError::validation(format!(
            "illegal status transition {} -> {}",
            old.overall_status, new.overall_status
        ))
        .with_field("overall_status", new.overall_status.as_str()));
    }

    if new.delivered_at.is_some() && new.overall_status != OverallStatus::Delivered {
        return Err(DomainError::validation(
            "delivered_at may only be set on a delivered status",
        ));
    }

    Ok(())
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn save_message(&self, message: &NotificationMessage) -> Result<(), DomainError> {
        let mut inner = self.inner.write().await;
        inner.messages.insert(message.message_id, message.clone());
        Ok(())
    }

    async fn get_message(&self, id: MessageId) -> Result<NotificationMessage, DomainError> {
        let inner = self.inner.read().await;
        inner
            .messages
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("message", id))
    }

    async fn save_delivery_status(&self, status: &DeliveryStatus) -> Result<(), DomainError> {
        let mut inner = self.inner.write().await;
        inner.statuses.insert(status.message_id, status.clone());
        Ok(())
    }

    async fn get_delivery_status(&self, id: MessageId) -> Result<DeliveryStatus, DomainError> {
        let inner = self.inner.read().await;
        inner
            .statuses
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("delivery status", id))
    }

    async fn update_delivery_status(&self, mut status: DeliveryStatus) -> Result<(), DomainError> {
        let mut inner = self.inner.write().await;

        let old = inner
            .statuses
            .get(&status.message_id)
            .ok_or_else(|| DomainError::not_found("delivery status", status.message_id))?;

        validate_update(old, &status)?;

        // Monotonic fields are compared-and-swapped, never moved backwards
        status.attempt_count = status.attempt_count.max(old.attempt_count);
        if let (Some(old_at), Some(new_at)) = (old.last_attempt_at, status.last_attempt_at)
            && new_at < old_at
        {
            status.last_attempt_at = Some(old_at);
        }

        inner.statuses.insert(status.message_id, status);
        Ok(())
    }

    async fn get_pending_messages(&self) -> Result<Vec<DeliveryStatus>, DomainError> {
        let inner = self.inner.read().await;
        Ok(inner
            .statuses
            .values()
            .filter(|status| status.overall_status == OverallStatus::Pending)
            .cloned()
            .collect())
    }

    async fn get_failed_messages(&self, limit: usize) -> Result<Vec<DeliveryStatus>, DomainError> {
        let inner = self.inner.read().await;
        let failed = inner
            .statuses
            .values()
            .filter(|status| status.overall_status == OverallStatus::Failed)
            .cloned();

        Ok(if limit == 0 {
            failed.collect()
        } else {
            failed.take(limit).collect()
        })
    }

    async fn health_check(&self) -> Result<(), DomainError> {
        let probe = async {
            let inner = self.inner.read().await;
            inner.statuses.len()
        };

        tokio::time::timeout(HEALTH_PROBE_TIMEOUT, probe)
            .await
            .map_err(|_| DomainError::dependency("status store probe timed out"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use herald_common::Priority;
    use herald_subscriber::SubscriberId;
    use pretty_assertions::assert_eq;
    use serde_json::Map;

    use super::*;
    use crate::types::MessageContent;

    fn message(id: MessageId) -> NotificationMessage {
        NotificationMessage {
            message_id: id,
            subscriber_id: SubscriberId::generate(),
            event_kind: "inquiry-business".to_string(),
            priority: Priority::Medium,
            recipients: vec!["user@example.com".to_string()],
            content: MessageContent::Email {
                subject: "New business inquiry".to_string(),
                html: "<p>hi</p>".to_string(),
                text: "hi".to_string(),
                headers: HashMap::new(),
                reply_to: None,
                tags: HashMap::new(),
            },
            event_data: Map::new(),
            correlation_id: "corr-1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_message_round_trip() {
        let store = MemoryStatusStore::new();
        let id = MessageId::generate();
        let msg = message(id);

        store.save_message(&msg).await.unwrap();
        assert_eq!(store.get_message(id).await.unwrap(), msg);
        assert!(
            store
                .get_message(MessageId::generate())
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_attempt_count_never_decreases() {
        let store = MemoryStatusStore::new();
        let id = MessageId::generate();
        let subscriber = SubscriberId::generate();

        let mut status =
            DeliveryStatus::pending(id, subscriber, &["user@example.com".to_string()]);
        store.save_delivery_status(&status).await.unwrap();

        status.overall_status = OverallStatus::Failed;
        status.attempt_count = 3;
        store.update_delivery_status(status.clone()).await.unwrap();

        // A stale writer with a lower count cannot move the counter back
        status.attempt_count = 1;
        store.update_delivery_status(status).await.unwrap();
        assert_eq!(store.get_delivery_status(id).await.unwrap().attempt_count, 3);
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected() {
        let store = MemoryStatusStore::new();
        let id = MessageId::generate();
        let subscriber = SubscriberId::generate();

        let mut status =
            DeliveryStatus::pending(id, subscriber, &["user@example.com".to_string()]);
        store.save_delivery_status(&status).await.unwrap();

        status.overall_status = OverallStatus::Sent;
        status.attempt_count = 1;
        store.update_delivery_status(status.clone()).await.unwrap();

        status.overall_status = OverallStatus::Delivered;
        status.delivered_at = Some(Utc::now());
        store.update_delivery_status(status.clone()).await.unwrap();

        // Delivered is final
        status.overall_status = OverallStatus::Sent;
        status.delivered_at = None;
        let err = store.update_delivery_status(status).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_delivered_at_requires_delivered_status() {
        let store = MemoryStatusStore::new();
        let id = MessageId::generate();

        let mut status = DeliveryStatus::pending(
            id,
            SubscriberId::generate(),
            &["user@example.com".to_string()],
        );
        store.save_delivery_status(&status).await.unwrap();

        status.overall_status = OverallStatus::Sent;
        status.delivered_at = Some(Utc::now());
        let err = store.update_delivery_status(status).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_pending_and_failed_listings() {
        let store = MemoryStatusStore::new();

        for _ in 0..3 {
            let status = DeliveryStatus::pending(
                MessageId::generate(),
                SubscriberId::generate(),
                &["user@example.com".to_string()],
            );
            store.save_delivery_status(&status).await.unwrap();
        }
        for _ in 0..4 {
            let mut status = DeliveryStatus::pending(
                MessageId::generate(),
                SubscriberId::generate(),
                &["user@example.com".to_string()],
            );
            status.overall_status = OverallStatus::Failed;
            status.attempt_count = 1;
            store.save_delivery_status(&status).await.unwrap();
        }

        assert_eq!(store.get_pending_messages().await.unwrap().len(), 3);
        assert_eq!(store.get_failed_messages(2).await.unwrap().len(), 2);
        assert_eq!(store.get_failed_messages(0).await.unwrap().len(), 4);

        let counts = store.count_by_status().await;
        assert_eq!(counts.get("pending"), Some(&3));
        assert_eq!(counts.get("failed"), Some(&4));
    }

    #[tokio::test]
    async fn test_update_without_prior_status_is_not_found() {
        let store = MemoryStatusStore::new();
        let status = DeliveryStatus::pending(
            MessageId::generate(),
            SubscriberId::generate(),
            &["user@example.com".to_string()],
        );
        let err = store.update_delivery_status(status).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
