//! Message and delivery-status records.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use herald_common::{Channel, Priority};
use herald_subscriber::SubscriberId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

/// Notification message identity.
///
/// ULIDs are lexicographically sortable by creation time, which keeps
/// pending/failed listings in arrival order for free.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(Ulid);

impl MessageId {
    /// Allocate a fresh identity.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Aggregate status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
    Blocked,
    OptedOut,
}

impl OverallStatus {
    /// Whether no further automatic transition occurs from this status.
    ///
    /// `Failed` is final once attempts are exhausted but remains the only
    /// status eligible for retry before that.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(
            self,
            Self::Delivered | Self::Failed | Self::Blocked | Self::OptedOut
        )
    }

    /// Whether a retry may move this status back to `Sent`.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
            Self::OptedOut => "opted_out",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the status machine admits `from -> to`.
///
/// ```text
/// pending ──send→ sent ──callback(ok)──→ delivered (final)
///    │             │
///    │             └──callback(fail)──→ failed
///    └──send(fail)→ failed ──retry→ sent
///                     │
///                     ├──attempts==max──→ failed (final)
///                     └──permanent──────→ blocked | opted_out (final)
/// ```
///
/// Same-status rewrites are always admitted so idempotent updates stay cheap.
#[must_use]
pub const fn can_transition(from: OverallStatus, to: OverallStatus) -> bool {
    use OverallStatus::{Blocked, Delivered, Failed, OptedOut, Pending, Sent};

    matches!(
        (from, to),
        (Pending, Sent | Failed | Blocked | OptedOut)
            | (Sent, Delivered | Failed)
            | (Failed, Sent | Blocked | OptedOut)
            | (Pending, Pending)
            | (Sent, Sent)
            | (Delivered, Delivered)
            | (Failed, Failed)
            | (Blocked, Blocked)
            | (OptedOut, OptedOut)
    )
}

/// Per-recipient delivery state inside an aggregate status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientStatus {
    pub address: String,
    pub status: OverallStatus,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl RecipientStatus {
    #[must_use]
    pub fn new(address: impl Into<String>, status: OverallStatus) -> Self {
        Self {
            address: address.into(),
            status,
            delivered_at: None,
            error_message: None,
        }
    }
}

/// Aggregate delivery status for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub message_id: MessageId,
    pub subscriber_id: SubscriberId,
    pub overall_status: OverallStatus,
    pub attempt_count: u32,
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub next_retry_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recipients: Vec<RecipientStatus>,
}

impl DeliveryStatus {
    /// A fresh `pending` status with zero attempts.
    #[must_use]
    pub fn pending(
        message_id: MessageId,
        subscriber_id: SubscriberId,
        recipients: &[String],
    ) -> Self {
        Self {
            message_id,
            subscriber_id,
            overall_status: OverallStatus::Pending,
            attempt_count: 0,
            last_attempt_at: None,
            delivered_at: None,
            error_message: None,
            next_retry_at: None,
            recipients: recipients
                .iter()
                .map(|address| RecipientStatus::new(address, OverallStatus::Pending))
                .collect(),
        }
    }
}

/// Channel-specific rendered payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum MessageContent {
    Email {
        subject: String,
        html: String,
        text: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        reply_to: Option<String>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    Sms {
        from: String,
        to: Vec<String>,
        text: String,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
}

impl MessageContent {
    /// The channel this payload travels over.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        match self {
            Self::Email { .. } => Channel::Email,
            Self::Sms { .. } => Channel::Sms,
        }
    }
}

/// A routed, rendered notification message persisted before send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub message_id: MessageId,
    pub subscriber_id: SubscriberId,
    /// Wire name of the event kind; kept as a string so unknown kinds that
    /// rendered through the generic template remain inspectable.
    pub event_kind: String,
    pub priority: Priority,
    pub recipients: Vec<String>,
    pub content: MessageContent,
    #[serde(default)]
    pub event_data: Map<String, Value>,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
}
