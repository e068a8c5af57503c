//! Event classification and priority derivation.
//!
//! A pure function of `(topic, payload)`: the same input always yields the
//! same `(kind, priority)` pair. Priority is derived here and never trusted
//! from the producer.

use crate::event::{DomainEvent, EventKind, OperationType, Priority};

/// Content topics whose CREATE/PUBLISH operations announce registrations.
const CONTENT_TOPICS: [&str; 4] = [
    "services-content",
    "news-content",
    "research-content",
    "events-content",
];

/// Classify an event into its canonical kind and derived priority.
#[must_use]
pub fn classify(event: &DomainEvent) -> (EventKind, Priority) {
    let kind = classify_kind(event);
    (kind, derive_priority(event, kind))
}

fn classify_kind(event: &DomainEvent) -> EventKind {
    let topic = event.topic.as_str();

    if topic.contains("business-inquiry") {
        return EventKind::InquiryBusiness;
    }
    if topic.contains("media-inquiry") {
        return EventKind::InquiryMedia;
    }
    if topic.contains("donation-inquiry") {
        return EventKind::InquiryDonations;
    }
    if topic.contains("volunteer-inquiry") {
        return EventKind::InquiryVolunteers;
    }

    if CONTENT_TOPICS.contains(&topic)
        && matches!(
            event.operation_type,
            Some(OperationType::Create | OperationType::Publish)
        )
    {
        return EventKind::EventRegistration;
    }

    let event_type = event.effective_event_type();
    if event_type.contains("error") {
        return EventKind::SystemError;
    }
    if event_type.contains("capacity") || event_type.contains("limit") {
        return EventKind::CapacityAlert;
    }
    if event_type.contains("audit") || event_type.contains("compliance") {
        return EventKind::ComplianceAlert;
    }

    EventKind::AdminActionRequired
}

/// Derive the event priority.
///
/// Resolution order: an explicit valid `priority` payload key wins, then the
/// operation type, then the event kind.
fn derive_priority(event: &DomainEvent, kind: EventKind) -> Priority {
    if let Some(priority) = Priority::parse(event.extract_str("priority")) {
        return priority;
    }

    if let Some(operation) = event.operation_type {
        return match operation {
            OperationType::Delete => Priority::High,
            OperationType::Create | OperationType::Publish => Priority::Medium,
            OperationType::Update => Priority::Low,
        };
    }

    match kind {
        EventKind::SystemError => Priority::Urgent,
        EventKind::CapacityAlert | EventKind::ComplianceAlert => Priority::High,
        EventKind::AdminActionRequired => Priority::Medium,
        kind if kind.is_inquiry() => Priority::Medium,
        _ => Priority::Low,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::{Map, Value};

    use super::*;

    fn event(topic: &str) -> DomainEvent {
        DomainEvent {
            event_id: "evt-1".to_string(),
            topic: topic.to_string(),
            event_type: String::new(),
            entity_type: String::new(),
            entity_id: String::new(),
            operation_type: None,
            user_id: None,
            correlation_id: None,
            data: Map::new(),
            timestamp: Utc::now(),
            environment: "test".to_string(),
        }
    }

    fn with_data(mut event: DomainEvent, key: &str, value: &str) -> DomainEvent {
        event
            .data
            .insert(key.to_string(), Value::String(value.to_string()));
        event
    }

    #[test]
    fn test_inquiry_topics_map_by_substring() {
        assert_eq!(
            classify(&event("prod.business-inquiry.created")).0,
            EventKind::InquiryBusiness
        );
        assert_eq!(
            classify(&event("media-inquiry")).0,
            EventKind::InquiryMedia
        );
        assert_eq!(
            classify(&event("donation-inquiry")).0,
            EventKind::InquiryDonations
        );
        assert_eq!(
            classify(&event("volunteer-inquiry")).0,
            EventKind::InquiryVolunteers
        );
    }

    #[test]
    fn test_content_create_and_publish_are_registrations() {
        for topic in ["services-content", "news-content", "research-content", "events-content"] {
            let mut evt = event(topic);
            evt.operation_type = Some(OperationType::Create);
            assert_eq!(classify(&evt).0, EventKind::EventRegistration);

            evt.operation_type = Some(OperationType::Publish);
            assert_eq!(classify(&evt).0, EventKind::EventRegistration);

            // UPDATE on a content topic is not a registration
            evt.operation_type = Some(OperationType::Update);
            assert_ne!(classify(&evt).0, EventKind::EventRegistration);
        }
    }

    #[test]
    fn test_event_type_substrings() {
        let evt = with_data(event("system-health"), "event_type", "database_error");
        assert_eq!(classify(&evt), (EventKind::SystemError, Priority::Urgent));

        let evt = with_data(event("system-health"), "event_type", "storage_capacity");
        assert_eq!(classify(&evt), (EventKind::CapacityAlert, Priority::High));

        let evt = with_data(event("system-health"), "event_type", "rate_limit_reached");
        assert_eq!(classify(&evt).0, EventKind::CapacityAlert);

        let evt = with_data(event("governance"), "event_type", "compliance_review");
        assert_eq!(classify(&evt), (EventKind::ComplianceAlert, Priority::High));

        let evt = with_data(event("governance"), "event_type", "audit_trail_gap");
        assert_eq!(classify(&evt).0, EventKind::ComplianceAlert);
    }

    #[test]
    fn test_unclassifiable_defaults_to_admin_action() {
        assert_eq!(
            classify(&event("something-else")),
            (EventKind::AdminActionRequired, Priority::Medium)
        );
    }

    #[test]
    fn test_payload_priority_wins() {
        let evt = with_data(event("business-inquiry"), "priority", "high");
        assert_eq!(classify(&evt), (EventKind::InquiryBusiness, Priority::High));

        // Garbage priority falls through to the kind default
        let evt = with_data(event("business-inquiry"), "priority", "extreme");
        assert_eq!(classify(&evt).1, Priority::Medium);
    }

    #[test]
    fn test_operation_priority_when_no_payload_priority() {
        let mut evt = event("news-content");
        evt.operation_type = Some(OperationType::Delete);
        assert_eq!(classify(&evt).1, Priority::High);

        evt.operation_type = Some(OperationType::Publish);
        assert_eq!(classify(&evt).1, Priority::Medium);

        evt.operation_type = Some(OperationType::Update);
        assert_eq!(classify(&evt).1, Priority::Low);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let evt = with_data(event("volunteer-inquiry"), "priority", "urgent");
        let first = classify(&evt);
        for _ in 0..10 {
            assert_eq!(classify(&evt), first);
        }
    }
}
