//! Template rendering.
//!
//! Deterministic and side-effect free: output is a pure function of the
//! event kind, priority, and payload. Renderers never touch the network or
//! the clock beyond the supplied timestamp. An unrecognized kind falls back
//! to the generic "new notification" template.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use herald_common::text::{SINGLE_SMS_MAX_BYTES, truncate_message};
use herald_common::{EventKind, Priority};
use serde_json::{Map, Value};

/// Header carrying the correlation id on every rendered email.
pub const CORRELATION_HEADER: &str = "X-Correlation-Id";

/// Rendered email payload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
    pub text: String,
    pub headers: HashMap<String, String>,
}

fn data_str<'a>(data: &'a Map<String, Value>, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// The most specific detail string the payload offers for a kind.
fn detail<'a>(kind: Option<EventKind>, data: &'a Map<String, Value>) -> &'a str {
    let keys: &[&str] = match kind {
        Some(EventKind::SystemError) => &["error_type", "event_type"],
        Some(EventKind::CapacityAlert) => &["alert_type", "resource_type", "event_type"],
        Some(EventKind::ComplianceAlert) => &["alert_type", "event_type"],
        Some(EventKind::AdminActionRequired) => &["action_type", "event_type"],
        _ => &["entity_type", "event_type"],
    };

    keys.iter()
        .map(|key| data_str(data, key))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn headline(kind: Option<EventKind>, data: &Map<String, Value>) -> String {
    let entity_id = data_str(data, "entity_id");
    let detail = detail(kind, data);

    let mut line = match kind {
        Some(EventKind::InquiryBusiness) => "New business inquiry".to_string(),
        Some(EventKind::InquiryMedia) => "New media inquiry".to_string(),
        Some(EventKind::InquiryDonations) => "New donation inquiry".to_string(),
        Some(EventKind::InquiryVolunteers) => "New volunteer inquiry".to_string(),
        Some(EventKind::EventRegistration) => "New event registration".to_string(),
        Some(EventKind::SystemError) => {
            if detail.is_empty() {
                "System error".to_string()
            } else {
                format!("System error: {detail}")
            }
        }
        Some(EventKind::CapacityAlert) => {
            if detail.is_empty() {
                "Capacity alert".to_string()
            } else {
                format!("Capacity alert: {detail}")
            }
        }
        Some(EventKind::ComplianceAlert) => {
            if detail.is_empty() {
                "Compliance alert".to_string()
            } else {
                format!("Compliance alert: {detail}")
            }
        }
        Some(EventKind::AdminActionRequired) => {
            if detail.is_empty() {
                "Admin action required".to_string()
            } else {
                format!("Admin action required: {detail}")
            }
        }
        None => "New notification".to_string(),
    };

    if !entity_id.is_empty() {
        line.push(' ');
        line.push_str(entity_id);
    }
    line
}

/// Render the SMS line for an event. Always at most 160 bytes.
#[must_use]
pub fn render_sms(
    kind: Option<EventKind>,
    priority: Priority,
    data: &Map<String, Value>,
) -> String {
    let headline = headline(kind, data);
    let line = if priority == Priority::Urgent {
        format!("URGENT: {headline}")
    } else {
        headline
    };

    truncate_message(&line, SINGLE_SMS_MAX_BYTES)
}

/// Render the email payload for an event.
///
/// The correlation id always travels in the headers; the entity id (when
/// present) appears in the user-visible text.
#[must_use]
pub fn render_email(
    kind: Option<EventKind>,
    priority: Priority,
    data: &Map<String, Value>,
    correlation_id: &str,
    timestamp: DateTime<Utc>,
) -> EmailContent {
    let headline = headline(kind, data);
    let entity_id = data_str(data, "entity_id");

    let subject = if priority == Priority::Urgent {
        format!("[URGENT] {headline}")
    } else {
        headline.clone()
    };

    let mut text = format!("{headline}\n\nPriority: {priority}\n");
    if !entity_id.is_empty() {
        text.push_str(&format!("Reference: {entity_id}\n"));
    }
    text.push_str(&format!("Received: {}\n", timestamp.to_rfc3339()));

    let html = format!(
        "<html><body>\
         <h2>{headline}</h2>\
         <p>Priority: <strong>{priority}</strong></p>\
         {}\
         <p><small>Received {}</small></p>\
         </body></html>",
        if entity_id.is_empty() {
            String::new()
        } else {
            format!("<p>Reference: {entity_id}</p>")
        },
        timestamp.to_rfc3339(),
    );

    let mut headers = HashMap::new();
    headers.insert(CORRELATION_HEADER.to_string(), correlation_id.to_string());

    EmailContent {
        subject,
        html,
        text,
        headers,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn data(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), Value::String((*value).to_string())))
            .collect()
    }

    #[test]
    fn test_business_inquiry_sms_shape() {
        let sms = render_sms(
            Some(EventKind::InquiryBusiness),
            Priority::High,
            &data(&[("entity_id", "biz-001")]),
        );
        assert!(sms.starts_with("New business inquiry biz-001"));
        assert!(sms.len() <= SINGLE_SMS_MAX_BYTES);
    }

    #[test]
    fn test_urgent_system_error_sms_mentions_detail() {
        let sms = render_sms(
            Some(EventKind::SystemError),
            Priority::Urgent,
            &data(&[("event_type", "database_error")]),
        );
        assert!(sms.contains("URGENT"));
        assert!(sms.contains("database_error"));
        assert!(sms.len() <= SINGLE_SMS_MAX_BYTES);
    }

    #[test]
    fn test_sms_is_bounded_even_with_huge_payload() {
        let long_id = "x".repeat(400);
        let sms = render_sms(
            Some(EventKind::InquiryMedia),
            Priority::Medium,
            &data(&[("entity_id", &long_id)]),
        );
        assert!(sms.len() <= SINGLE_SMS_MAX_BYTES);
        assert!(sms.ends_with("..."));
    }

    #[test]
    fn test_email_carries_correlation_header_and_entity() {
        let email = render_email(
            Some(EventKind::ComplianceAlert),
            Priority::High,
            &data(&[("entity_id", "case-7"), ("alert_type", "gdpr_review")]),
            "corr-123",
            Utc::now(),
        );

        assert_eq!(
            email.headers.get(CORRELATION_HEADER).map(String::as_str),
            Some("corr-123")
        );
        assert!(email.subject.contains("gdpr_review"));
        assert!(email.text.contains("case-7"));
        assert!(email.html.contains("case-7"));
    }

    #[test]
    fn test_urgent_email_subject_is_flagged() {
        let email = render_email(
            Some(EventKind::SystemError),
            Priority::Urgent,
            &data(&[("error_type", "disk_full")]),
            "corr-9",
            Utc::now(),
        );
        assert!(email.subject.starts_with("[URGENT]"));
        assert!(email.subject.contains("disk_full"));
    }

    #[test]
    fn test_unknown_kind_renders_generic_template() {
        let sms = render_sms(None, Priority::Low, &data(&[("entity_id", "thing-1")]));
        assert_eq!(sms, "New notification thing-1");

        let email = render_email(None, Priority::Low, &Map::new(), "corr-0", Utc::now());
        assert_eq!(email.subject, "New notification");
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let payload = data(&[("entity_id", "evt-1"), ("event_type", "capacity_watermark")]);
        let timestamp = Utc::now();
        let first = render_email(
            Some(EventKind::CapacityAlert),
            Priority::High,
            &payload,
            "corr-1",
            timestamp,
        );
        let second = render_email(
            Some(EventKind::CapacityAlert),
            Priority::High,
            &payload,
            "corr-1",
            timestamp,
        );
        assert_eq!(first, second);
    }
}
