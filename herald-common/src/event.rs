//! The ingress domain-event model.
//!
//! Producers across the content, inquiry, and system-health subsystems
//! publish [`DomainEvent`]s. Payloads are schemaless string-keyed maps;
//! the typed accessors return the zero value on absence so classifier and
//! renderer code never has to unwrap. Expected payload keys per event kind:
//! `entity_id`, `entity_type`, `error_type`, `resource_type`, `action_type`,
//! `alert_type`, `event_type`, `priority`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The nine canonical event classifications.
///
/// Anything the classifier cannot place maps to `AdminActionRequired`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    InquiryBusiness,
    InquiryMedia,
    InquiryDonations,
    InquiryVolunteers,
    EventRegistration,
    SystemError,
    CapacityAlert,
    AdminActionRequired,
    ComplianceAlert,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::InquiryBusiness,
        Self::InquiryMedia,
        Self::InquiryDonations,
        Self::InquiryVolunteers,
        Self::EventRegistration,
        Self::SystemError,
        Self::CapacityAlert,
        Self::AdminActionRequired,
        Self::ComplianceAlert,
    ];

    /// The kebab-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InquiryBusiness => "inquiry-business",
            Self::InquiryMedia => "inquiry-media",
            Self::InquiryDonations => "inquiry-donations",
            Self::InquiryVolunteers => "inquiry-volunteers",
            Self::EventRegistration => "event-registration",
            Self::SystemError => "system-error",
            Self::CapacityAlert => "capacity-alert",
            Self::AdminActionRequired => "admin-action-required",
            Self::ComplianceAlert => "compliance-alert",
        }
    }

    /// Whether this kind is one of the four inquiry classifications.
    #[must_use]
    pub const fn is_inquiry(self) -> bool {
        matches!(
            self,
            Self::InquiryBusiness
                | Self::InquiryMedia
                | Self::InquiryDonations
                | Self::InquiryVolunteers
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Returned when parsing a string that names no canonical event kind.
#[derive(Debug, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

/// Event priority, total-ordered `Low < Medium < High < Urgent`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// The lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    /// Parse a payload-supplied priority; anything unrecognized is `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operation a producer performed on its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Create,
    Update,
    Delete,
    Publish,
}

impl OperationType {
    /// Parse a payload-supplied operation; anything unrecognized is `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREATE" => Some(Self::Create),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            "PUBLISH" => Some(Self::Publish),
            _ => None,
        }
    }
}

/// A raw domain event as published by a producer.
///
/// Priority is always derived by the classifier, never trusted from the
/// source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: String,
    pub topic: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub operation_type: Option<OperationType>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub environment: String,
}

impl DomainEvent {
    /// Extract a string payload value; absent or non-string keys yield `""`.
    #[must_use]
    pub fn extract_str(&self, key: &str) -> &str {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Extract an integer payload value; absent or non-integer keys yield `0`.
    #[must_use]
    pub fn extract_i64(&self, key: &str) -> i64 {
        self.data
            .get(key)
            .and_then(Value::as_i64)
            .unwrap_or_default()
    }

    /// The effective event-type string: the payload's `event_type` key when
    /// present, otherwise the envelope field.
    #[must_use]
    pub fn effective_event_type(&self) -> &str {
        let from_data = self.extract_str("event_type");
        if from_data.is_empty() {
            &self.event_type
        } else {
            from_data
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_priority_is_total_ordered() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Urgent);
    }

    #[test]
    fn test_event_kind_round_trips_through_wire_name() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("push-notification".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_extract_returns_zero_values_on_absence() {
        let event = DomainEvent {
            event_id: "evt-1".to_string(),
            topic: "business-inquiry".to_string(),
            event_type: String::new(),
            entity_type: String::new(),
            entity_id: String::new(),
            operation_type: None,
            user_id: None,
            correlation_id: None,
            data: Map::new(),
            timestamp: Utc::now(),
            environment: "test".to_string(),
        };

        assert_eq!(event.extract_str("entity_id"), "");
        assert_eq!(event.extract_i64("attempt"), 0);
    }

    #[test]
    fn test_effective_event_type_prefers_payload() {
        let mut data = Map::new();
        data.insert(
            "event_type".to_string(),
            Value::String("database_error".to_string()),
        );
        let event = DomainEvent {
            event_id: "evt-2".to_string(),
            topic: "system-health".to_string(),
            event_type: "heartbeat".to_string(),
            entity_type: String::new(),
            entity_id: String::new(),
            operation_type: None,
            user_id: None,
            correlation_id: None,
            data,
            timestamp: Utc::now(),
            environment: "test".to_string(),
        };

        assert_eq!(event.effective_event_type(), "database_error");
    }

    #[test]
    fn test_operation_type_parse() {
        assert_eq!(OperationType::parse("DELETE"), Some(OperationType::Delete));
        assert_eq!(OperationType::parse("delete"), None);
        assert_eq!(OperationType::parse("ARCHIVE"), None);
    }
}
