//! The delivery-status store contract.

use async_trait::async_trait;
use herald_common::DomainError;

use crate::types::{DeliveryStatus, MessageId, NotificationMessage};

/// Storage contract for notification messages and their delivery statuses.
///
/// Within one message id, updates are serialized by the store; monotonic
/// fields (`attempt_count`, `last_attempt_at`) never move backwards and the
/// `overall_status` only moves along the transition DAG. Across messages no
/// ordering is promised.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Persist a routed, rendered message.
    async fn save_message(&self, message: &NotificationMessage) -> Result<(), DomainError>;

    /// Fetch a persisted message.
    ///
    /// # Errors
    /// `NotFound` when the message does not exist.
    async fn get_message(&self, id: MessageId) -> Result<NotificationMessage, DomainError>;

    /// Persist an initial delivery status.
    async fn save_delivery_status(&self, status: &DeliveryStatus) -> Result<(), DomainError>;

    /// Fetch the current delivery status for a message.
    ///
    /// # Errors
    /// `NotFound` when no status exists for the message.
    async fn get_delivery_status(&self, id: MessageId) -> Result<DeliveryStatus, DomainError>;

    /// Update a delivery status.
    ///
    /// # Errors
    /// `NotFound` when no prior status exists; `Validation` when the status
    /// transition violates the DAG or `delivered_at` is set on a
    /// non-delivered status.
    async fn update_delivery_status(&self, status: DeliveryStatus) -> Result<(), DomainError>;

    /// All statuses still `pending`, oldest first.
    async fn get_pending_messages(&self) -> Result<Vec<DeliveryStatus>, DomainError>;

    /// Up to `limit` `failed` statuses, oldest first. A limit of zero means
    /// "no limit".
    async fn get_failed_messages(&self, limit: usize) -> Result<Vec<DeliveryStatus>, DomainError>;

    /// Round-trip probe of the backing store.
    ///
    /// # Errors
    /// `Dependency` on timeout or probe failure.
    async fn health_check(&self) -> Result<(), DomainError>;
}
