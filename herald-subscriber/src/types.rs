//! Subscriber model types.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use herald_common::{Channel, DomainError, EventKind, Priority, address};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque subscriber identity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    /// Allocate a fresh identity.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a caller-supplied identity string.
    ///
    /// # Errors
    /// `Validation` when the string is not a well-formed UUID.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        Uuid::parse_str(value).map(Self).map_err(|_| {
            DomainError::validation("malformed subscriber id").with_field("subscriber_id", value)
        })
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SubscriberId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Subscriber lifecycle status. Only `Active` subscribers are routed to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    Active,
    Inactive,
    Suspended,
}

impl SubscriberStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }
}

/// A delivery method as chosen by the subscriber; `Both` is a convenience
/// that normalizes to the email and SMS channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMethod {
    Email,
    Sms,
    Both,
}

/// Normalize methods into the concrete channel set, expanding `Both`.
#[must_use]
pub fn normalize_methods(methods: &[NotificationMethod]) -> BTreeSet<Channel> {
    let mut channels = BTreeSet::new();
    for method in methods {
        match method {
            NotificationMethod::Email => {
                channels.insert(Channel::Email);
            }
            NotificationMethod::Sms => {
                channels.insert(Channel::Sms);
            }
            NotificationMethod::Both => {
                channels.insert(Channel::Email);
                channels.insert(Channel::Sms);
            }
        }
    }
    channels
}

/// Delivery schedule. `Immediate` dispatches now; the other two bucket into
/// per-subscriber delivery windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    Immediate,
    Hourly,
    Daily,
}

/// A stored subscriber record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub name: String,
    /// Globally unique among non-deleted rows.
    pub email: String,
    /// E.164, required whenever `channels` contains SMS.
    pub phone: Option<String>,
    pub status: SubscriberStatus,
    pub event_types: BTreeSet<EventKind>,
    /// Normalized channel set (`both` already expanded).
    pub channels: BTreeSet<Channel>,
    pub schedule: Schedule,
    pub priority_threshold: Priority,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Subscriber {
    /// Whether this subscriber participates in routing at all.
    #[must_use]
    pub fn is_routable(&self) -> bool {
        !self.is_deleted && self.status == SubscriberStatus::Active
    }

    /// The recipient address for a channel, when the subscriber has one.
    #[must_use]
    pub fn recipient_for(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Email => Some(self.email.as_str()),
            Channel::Sms => self.phone.as_deref(),
        }
    }
}

/// Input for creating a subscriber; the store allocates the identity and
/// stamps the audit tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberDraft {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub status: SubscriberStatus,
    pub event_types: BTreeSet<EventKind>,
    pub methods: Vec<NotificationMethod>,
    pub schedule: Schedule,
    pub priority_threshold: Priority,
    #[serde(default)]
    pub notes: String,
    pub created_by: String,
}

impl SubscriberDraft {
    /// Validate the draft and normalize it into a stored record.
    ///
    /// The phone number is normalized to E.164 when SMS is among the chosen
    /// methods.
    ///
    /// # Errors
    /// `Validation` on an invalid email, a missing or invalid phone number
    /// when SMS is requested, or an empty method set.
    pub fn into_subscriber(self, id: SubscriberId, now: DateTime<Utc>) -> Result<Subscriber, DomainError> {
        if !address::is_valid_email(&self.email) {
            return Err(
                DomainError::validation("invalid email address").with_field("email", &self.email)
            );
        }

        let channels = normalize_methods(&self.methods);
        if channels.is_empty() {
            return Err(DomainError::validation(
                "at least one notification method is required",
            ));
        }

        let phone = if channels.contains(&Channel::Sms) {
            let raw = self.phone.as_deref().unwrap_or_default();
            if !address::is_valid_us_phone(raw) {
                return Err(DomainError::validation(
                    "SMS notifications require a valid US phone number",
                )
                .with_field("phone", raw));
            }
            Some(address::format_e164(raw))
        } else {
            self.phone.clone()
        };

        Ok(Subscriber {
            id,
            name: self.name,
            email: self.email,
            phone,
            status: self.status,
            event_types: self.event_types,
            channels,
            schedule: self.schedule,
            priority_threshold: self.priority_threshold,
            notes: self.notes,
            created_at: now,
            created_by: self.created_by.clone(),
            updated_at: now,
            updated_by: self.created_by,
            is_deleted: false,
            deleted_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn draft(email: &str) -> SubscriberDraft {
        SubscriberDraft {
            name: "Test Subscriber".to_string(),
            email: email.to_string(),
            phone: None,
            status: SubscriberStatus::Active,
            event_types: BTreeSet::from([EventKind::InquiryBusiness]),
            methods: vec![NotificationMethod::Email],
            schedule: Schedule::Immediate,
            priority_threshold: Priority::Medium,
            notes: String::new(),
            created_by: "tester".to_string(),
        }
    }

    #[test]
    fn test_normalize_methods_expands_both() {
        let channels = normalize_methods(&[NotificationMethod::Both]);
        assert_eq!(channels, BTreeSet::from([Channel::Email, Channel::Sms]));

        let channels = normalize_methods(&[NotificationMethod::Email, NotificationMethod::Both]);
        assert_eq!(channels.len(), 2);
    }

    #[test]
    fn test_draft_normalizes_phone_for_sms() {
        let mut input = draft("sms@example.com");
        input.methods = vec![NotificationMethod::Sms];
        input.phone = Some("(212) 555-1234".to_string());

        let subscriber = input
            .into_subscriber(SubscriberId::generate(), Utc::now())
            .expect("draft should validate");
        assert_eq!(subscriber.phone.as_deref(), Some("+12125551234"));
    }

    #[test]
    fn test_draft_rejects_sms_without_phone() {
        let mut input = draft("sms@example.com");
        input.methods = vec![NotificationMethod::Both];

        let err = input
            .into_subscriber(SubscriberId::generate(), Utc::now())
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.field(), Some("phone"));
    }

    #[test]
    fn test_draft_rejects_invalid_email() {
        let err = draft("not-an-email")
            .into_subscriber(SubscriberId::generate(), Utc::now())
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.field(), Some("email"));
    }

    #[test]
    fn test_subscriber_id_parse() {
        let id = SubscriberId::generate();
        assert_eq!(SubscriberId::parse(&id.to_string()).unwrap(), id);
        assert!(SubscriberId::parse("garbage").unwrap_err().is_validation());
    }

    #[test]
    fn test_recipient_for_channel() {
        let mut input = draft("both@example.com");
        input.methods = vec![NotificationMethod::Both];
        input.phone = Some("212-555-1234".to_string());

        let subscriber = input
            .into_subscriber(SubscriberId::generate(), Utc::now())
            .unwrap();
        assert_eq!(
            subscriber.recipient_for(Channel::Email),
            Some("both@example.com")
        );
        assert_eq!(
            subscriber.recipient_for(Channel::Sms),
            Some("+12125551234")
        );
    }
}
