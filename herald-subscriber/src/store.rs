//! The subscriber store contract.

use async_trait::async_trait;
use herald_common::{DomainError, EventKind, Priority};

use crate::types::{Subscriber, SubscriberDraft, SubscriberId, SubscriberStatus};

/// Paging and filtering for [`SubscriberStore::list`].
///
/// Bounds are signed so out-of-range caller input surfaces as `Validation`
/// instead of being silently clamped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter {
    pub status: Option<SubscriberStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl ListFilter {
    /// Validate the bounds, returning `(limit, offset)` as usable sizes.
    ///
    /// A `limit` of zero means "no limit".
    ///
    /// # Errors
    /// `Validation` when either bound is negative.
    pub fn bounds(&self) -> Result<(usize, usize), DomainError> {
        if self.limit < 0 {
            return Err(DomainError::validation("limit must not be negative")
                .with_field("limit", self.limit.to_string()));
        }
        if self.offset < 0 {
            return Err(DomainError::validation("offset must not be negative")
                .with_field("offset", self.offset.to_string()));
        }

        #[allow(clippy::cast_sign_loss, reason = "negative values rejected above")]
        let bounds = (self.limit as usize, self.offset as usize);
        Ok(bounds)
    }
}

/// One page of subscribers plus the total count matching the filter.
#[derive(Debug, Clone)]
pub struct SubscriberPage {
    pub subscribers: Vec<Subscriber>,
    pub total: usize,
}

/// Storage contract for subscriber records.
///
/// Implementations maintain four secondary indexes over non-deleted rows:
/// unique `email -> id`, `status -> ids`, `event type -> ids` (multi-valued),
/// and `priority threshold -> ids`. Index updates are atomic with respect to
/// the primary write; readers tolerate brief skew by re-filtering
/// `is_deleted` and `status` after lookup.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Create a subscriber, allocating its identity.
    ///
    /// # Errors
    /// `Validation` on a duplicate email among live rows or an invalid
    /// draft; `Dependency` on backing store failure.
    async fn create(&self, draft: SubscriberDraft) -> Result<Subscriber, DomainError>;

    /// Fetch a subscriber. Soft-deleted rows are absent.
    ///
    /// # Errors
    /// `NotFound` when the row does not exist or is deleted.
    async fn get(&self, id: SubscriberId) -> Result<Subscriber, DomainError>;

    /// Case-sensitive lookup through the email index.
    ///
    /// # Errors
    /// `NotFound` when absent or deleted.
    async fn get_by_email(&self, email: &str) -> Result<Subscriber, DomainError>;

    /// Replace a subscriber record, rewriting only the indexes whose keys
    /// changed.
    ///
    /// # Errors
    /// `NotFound` when the row does not exist or is deleted; `Validation`
    /// when the new email would collide with another live row.
    async fn update(&self, subscriber: Subscriber) -> Result<Subscriber, DomainError>;

    /// Soft-delete a subscriber, preserving the row for audit.
    ///
    /// # Errors
    /// `NotFound` when the row does not exist or is already deleted.
    async fn soft_delete(&self, id: SubscriberId, deleted_by: &str) -> Result<(), DomainError>;

    /// Deterministic page ordered by `created_at` descending.
    ///
    /// # Errors
    /// `Validation` on negative bounds.
    async fn list(&self, filter: ListFilter) -> Result<SubscriberPage, DomainError>;

    /// Active, non-deleted subscribers subscribed to `kind`.
    async fn get_by_event_type(&self, kind: EventKind) -> Result<Vec<Subscriber>, DomainError>;

    /// Active, non-deleted subscribers whose threshold admits `priority`.
    async fn get_by_priority(&self, priority: Priority) -> Result<Vec<Subscriber>, DomainError>;

    /// Whether a live row holds `email`; `exclude` lets a subscriber keep
    /// its own address during updates.
    async fn check_email_exists(
        &self,
        email: &str,
        exclude: Option<SubscriberId>,
    ) -> Result<bool, DomainError>;

    /// Round-trip probe of the backing store, bounded at five seconds.
    ///
    /// # Errors
    /// `Dependency` on timeout or probe failure.
    async fn health_check(&self) -> Result<(), DomainError>;
}
