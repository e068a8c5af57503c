//! In-memory subscriber store.
//!
//! Rows live in a `HashMap` behind a `tokio::sync::RwLock` alongside the
//! four secondary indexes; holding the write lock across a row write and its
//! index updates makes the pair atomic. Intended for tests and single-node
//! deployments.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use herald_common::audit::{AuditEvent, AuditOperation, SharedAuditSink};
use herald_common::{DomainError, EventKind, Priority};
use tokio::sync::RwLock;

use crate::store::{ListFilter, SubscriberPage, SubscriberStore};
use crate::types::{Subscriber, SubscriberDraft, SubscriberId, SubscriberStatus};

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Secondary indexes, scoped to non-deleted rows.
#[derive(Debug, Default)]
struct Indexes {
    email: HashMap<String, SubscriberId>,
    status: HashMap<SubscriberStatus, BTreeSet<SubscriberId>>,
    event_type: HashMap<EventKind, BTreeSet<SubscriberId>>,
    priority: HashMap<Priority, BTreeSet<SubscriberId>>,
}

impl Indexes {
    fn insert(&mut self, subscriber: &Subscriber) {
        self.email
            .insert(subscriber.email.clone(), subscriber.id);
        self.status
            .entry(subscriber.status)
            .or_default()
            .insert(subscriber.id);
        for kind in &subscriber.event_types {
            self.event_type.entry(*kind).or_default().insert(subscriber.id);
        }
        self.priority
            .entry(subscriber.priority_threshold)
            .or_default()
            .insert(subscriber.id);
    }

    fn remove(&mut self, subscriber: &Subscriber) {
        self.email.remove(&subscriber.email);
        if let Some(ids) = self.status.get_mut(&subscriber.status) {
            ids.remove(&subscriber.id);
        }
        for kind in &subscriber.event_types {
            if let Some(ids) = self.event_type.get_mut(kind) {
                ids.remove(&subscriber.id);
            }
        }
        if let Some(ids) = self.priority.get_mut(&subscriber.priority_threshold) {
            ids.remove(&subscriber.id);
        }
    }

    /// Rewrite only the indexes whose keys changed between `old` and `new`.
    fn rewrite_changed(&mut self, old: &Subscriber, new: &Subscriber) {
        if old.email != new.email {
            self.email.remove(&old.email);
            self.email.insert(new.email.clone(), new.id);
        }
        if old.status != new.status {
            if let Some(ids) = self.status.get_mut(&old.status) {
                ids.remove(&old.id);
            }
            self.status.entry(new.status).or_default().insert(new.id);
        }
        if old.event_types != new.event_types {
            for kind in old.event_types.difference(&new.event_types) {
                if let Some(ids) = self.event_type.get_mut(kind) {
                    ids.remove(&old.id);
                }
            }
            for kind in new.event_types.difference(&old.event_types) {
                self.event_type.entry(*kind).or_default().insert(new.id);
            }
        }
        if old.priority_threshold != new.priority_threshold {
            if let Some(ids) = self.priority.get_mut(&old.priority_threshold) {
                ids.remove(&old.id);
            }
            self.priority
                .entry(new.priority_threshold)
                .or_default()
                .insert(new.id);
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<SubscriberId, Subscriber>,
    indexes: Indexes,
}

/// In-memory [`SubscriberStore`] implementation.
#[derive(Debug, Clone, Default)]
pub struct MemorySubscriberStore {
    inner: Arc<RwLock<Inner>>,
    audit: Option<SharedAuditSink>,
    environment: String,
}

impl MemorySubscriberStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish audit events for each mutation through `sink`.
    #[must_use]
    pub fn with_audit(mut self, sink: SharedAuditSink, environment: impl Into<String>) -> Self {
        self.audit = Some(sink);
        self.environment = environment.into();
        self
    }

    /// Number of live (non-deleted) rows.
    pub async fn len(&self) -> usize {
        let inner = self.inner.read().await;
        inner.rows.values().filter(|row| !row.is_deleted).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn publish_audit(
        &self,
        operation: AuditOperation,
        subscriber: &Subscriber,
        actor: &str,
        before: Option<&Subscriber>,
    ) {
        let Some(sink) = &self.audit else { return };

        let event = AuditEvent::new(
            "subscriber",
            subscriber.id.to_string(),
            operation,
            self.environment.clone(),
        )
        .with_user(actor)
        .with_snapshot(
            before.and_then(|row| serde_json::to_value(row).ok()),
            serde_json::to_value(subscriber).ok(),
        );
        sink.publish(&event);
    }
}

#[async_trait]
impl SubscriberStore for MemorySubscriberStore {
    async fn create(&self, draft: SubscriberDraft) -> Result<Subscriber, DomainError> {
        let subscriber = draft.into_subscriber(SubscriberId::generate(), Utc::now())?;

        let mut inner = self.inner.write().await;
        if inner.indexes.email.contains_key(&subscriber.email) {
            return Err(DomainError::validation("email is already subscribed")
                .with_field("email", &subscriber.email));
        }

        inner.indexes.insert(&subscriber);
        inner.rows.insert(subscriber.id, subscriber.clone());
        drop(inner);

        let actor = subscriber.created_by.clone();
        self.publish_audit(AuditOperation::Insert, &subscriber, &actor, None);

        Ok(subscriber)
    }

    async fn get(&self, id: SubscriberId) -> Result<Subscriber, DomainError> {
        let inner = self.inner.read().await;
        inner
            .rows
            .get(&id)
            .filter(|row| !row.is_deleted)
            .cloned()
            .ok_or_else(|| DomainError::not_found("subscriber", id))
    }

    async fn get_by_email(&self, email: &str) -> Result<Subscriber, DomainError> {
        let inner = self.inner.read().await;
        inner
            .indexes
            .email
            .get(email)
            .and_then(|id| inner.rows.get(id))
            .filter(|row| !row.is_deleted)
            .cloned()
            .ok_or_else(|| DomainError::not_found("subscriber", email))
    }

    async fn update(&self, mut subscriber: Subscriber) -> Result<Subscriber, DomainError> {
        let mut inner = self.inner.write().await;

        let old = inner
            .rows
            .get(&subscriber.id)
            .filter(|row| !row.is_deleted)
            .cloned()
            .ok_or_else(|| DomainError::not_found("subscriber", subscriber.id))?;

        if old.email != subscriber.email
            && inner.indexes.email.contains_key(&subscriber.email)
        {
            return Err(DomainError::validation("email is already subscribed")
                .with_field("email", &subscriber.email));
        }

        subscriber.updated_at = Utc::now();
        inner.indexes.rewrite_changed(&old, &subscriber);
        inner.rows.insert(subscriber.id, subscriber.clone());
        drop(inner);

        let actor = subscriber.updated_by.clone();
        self.publish_audit(AuditOperation::Update, &subscriber, &actor, Some(&old));

        Ok(subscriber)
    }

    async fn soft_delete(&self, id: SubscriberId, deleted_by: &str) -> Result<(), DomainError> {
        let mut inner = self.inner.write().await;

        let old = inner
            .rows
            .get(&id)
            .filter(|row| !row.is_deleted)
            .cloned()
            .ok_or_else(|| DomainError::not_found("subscriber", id))?;

        inner.indexes.remove(&old);

        let mut deleted = old.clone();
        deleted.is_deleted = true;
        deleted.deleted_at = Some(Utc::now());
        deleted.updated_at = Utc::now();
        deleted.updated_by = deleted_by.to_string();
        inner.rows.insert(id, deleted.clone());
        drop(inner);

        self.publish_audit(AuditOperation::Delete, &deleted, deleted_by, Some(&old));

        Ok(())
    }

    async fn list(&self, filter: ListFilter) -> Result<SubscriberPage, DomainError> {
        let (limit, offset) = filter.bounds()?;

        let inner = self.inner.read().await;
        let mut matching: Vec<Subscriber> = inner
            .rows
            .values()
            .filter(|row| !row.is_deleted)
            .filter(|row| filter.status.is_none_or(|status| row.status == status))
            .cloned()
            .collect();
        drop(inner);

        // Newest first; identity tie-break keeps paging deterministic
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len();
        let page: Vec<Subscriber> = matching
            .into_iter()
            .skip(offset)
            .take(if limit == 0 { usize::MAX } else { limit })
            .collect();

        Ok(SubscriberPage {
            subscribers: page,
            total,
        })
    }

    async fn get_by_event_type(&self, kind: EventKind) -> Result<Vec<Subscriber>, DomainError> {
        let inner = self.inner.read().await;
        let Some(ids) = inner.indexes.event_type.get(&kind) else {
            return Ok(Vec::new());
        };

        Ok(ids
            .iter()
            .filter_map(|id| inner.rows.get(id))
            .filter(|row| row.is_routable())
            .cloned()
            .collect())
    }

    async fn get_by_priority(&self, priority: Priority) -> Result<Vec<Subscriber>, DomainError> {
        let inner = self.inner.read().await;

        let mut matching: Vec<Subscriber> = inner
            .indexes
            .priority
            .iter()
            .filter(|(threshold, _)| **threshold <= priority)
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|id| inner.rows.get(id))
            .filter(|row| row.is_routable())
            .cloned()
            .collect();
        drop(inner);

        matching.sort_by_key(|row| row.id);
        Ok(matching)
    }

    async fn check_email_exists(
        &self,
        email: &str,
        exclude: Option<SubscriberId>,
    ) -> Result<bool, DomainError> {
        let inner = self.inner.read().await;
        Ok(inner
            .indexes
            .email
            .get(email)
            .is_some_and(|id| exclude != Some(*id)))
    }

    async fn health_check(&self) -> Result<(), DomainError> {
        let probe = async {
            let inner = self.inner.read().await;
            inner.rows.len()
        };

        tokio::time::timeout(HEALTH_PROBE_TIMEOUT, probe)
            .await
            .map_err(|_| DomainError::dependency("subscriber store probe timed out"))?;
        Ok(())
    }
}
