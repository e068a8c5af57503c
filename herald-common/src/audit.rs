//! Audit egress for subscriber mutations and delivery outcomes.
//!
//! The core publishes one audit event per state-changing subscriber
//! operation and one per significant delivery outcome; it never reads them
//! back. Events are handed to an [`AuditSink`]; the default sink emits
//! structured `tracing` records. Recipient addresses can be redacted via
//! [`AuditConfig`] before they reach the sink.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Audit logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit publication.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Redact recipient addresses from audit records (PII protection).
    #[serde(default)]
    pub redact_recipients: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redact_recipients: false,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// The operation recorded by an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOperation {
    Insert,
    Update,
    Delete,
    Publish,
    Archive,
    Access,
}

/// Before/after snapshot attached to an audit event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
}

/// One audit record, published to the sink and never queried by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub audit_id: Uuid,
    pub entity_type: String,
    pub entity_id: String,
    pub operation_type: AuditOperation,
    pub audit_time: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    pub environment: String,
    #[serde(default)]
    pub data_snapshot: DataSnapshot,
}

impl AuditEvent {
    /// Create an event with a fresh audit id stamped at `Utc::now()`.
    #[must_use]
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        operation_type: AuditOperation,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            operation_type,
            audit_time: Utc::now(),
            user_id: None,
            correlation_id: None,
            trace_id: None,
            environment: environment.into(),
            data_snapshot: DataSnapshot::default(),
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    #[must_use]
    pub fn with_snapshot(mut self, before: Option<Value>, after: Option<Value>) -> Self {
        self.data_snapshot = DataSnapshot { before, after };
        self
    }
}

/// Egress sink for audit events.
pub trait AuditSink: Send + Sync + std::fmt::Debug {
    fn publish(&self, event: &AuditEvent);
}

/// Default sink: structured `tracing` records.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink {
    config: AuditConfig,
}

impl TracingAuditSink {
    #[must_use]
    pub const fn new(config: AuditConfig) -> Self {
        Self { config }
    }
}

impl AuditSink for TracingAuditSink {
    fn publish(&self, event: &AuditEvent) {
        if !self.config.enabled {
            return;
        }

        let snapshot = DataSnapshot {
            before: event
                .data_snapshot
                .before
                .clone()
                .map(|value| redact_snapshot(value, self.config.redact_recipients)),
            after: event
                .data_snapshot
                .after
                .clone()
                .map(|value| redact_snapshot(value, self.config.redact_recipients)),
        };

        tracing::event!(
            tracing::Level::INFO,
            audit_id = %event.audit_id,
            entity_type = %event.entity_type,
            entity_id = %event.entity_id,
            operation = ?event.operation_type,
            user_id = event.user_id.as_deref().unwrap_or("system"),
            correlation_id = event.correlation_id.as_deref().unwrap_or_default(),
            environment = %event.environment,
            snapshot = ?snapshot,
            "Audit: {:?} {}",
            event.operation_type,
            event.entity_type,
        );
    }
}

/// Redact recipient-bearing keys (`email`, `phone`, `recipients`) in a
/// snapshot before it reaches the log.
fn redact_snapshot(mut value: Value, redact: bool) -> Value {
    if !redact {
        return value;
    }

    if let Value::Object(object) = &mut value {
        if let Some(Value::String(email)) = object.get_mut("email") {
            *email = redact_address(email, true);
        }
        if let Some(Value::String(phone)) = object.get_mut("phone") {
            *phone = redact_address(phone, true);
        }
        if let Some(Value::Array(recipients)) = object.get_mut("recipients") {
            for recipient in recipients {
                if let Value::String(address) = recipient {
                    *address = redact_address(address, true);
                }
            }
        }
    }

    value
}

/// Shared handle to a sink, cheap to pass into every service.
pub type SharedAuditSink = Arc<dyn AuditSink>;

/// Redact an address if redaction is enabled, keeping the domain.
#[must_use]
pub fn redact_address(address: &str, redact: bool) -> String {
    if redact {
        address.split_once('@').map_or_else(
            || "[REDACTED]".to_string(),
            |(_, domain)| format!("[REDACTED]@{domain}"),
        )
    } else {
        address.to_string()
    }
}

/// Redact multiple addresses.
#[must_use]
pub fn redact_addresses(addresses: &[String], redact: bool) -> Vec<String> {
    addresses
        .iter()
        .map(|address| redact_address(address, redact))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_address() {
        assert_eq!(
            redact_address("user@example.com", true),
            "[REDACTED]@example.com"
        );
        assert_eq!(redact_address("user@example.com", false), "user@example.com");
        assert_eq!(redact_address("+12125551234", true), "[REDACTED]");
    }

    #[test]
    fn test_redact_addresses() {
        let addresses = vec![
            "a@example.com".to_string(),
            "b@example.org".to_string(),
        ];
        let redacted = redact_addresses(&addresses, true);
        assert_eq!(redacted[0], "[REDACTED]@example.com");
        assert_eq!(redacted[1], "[REDACTED]@example.org");
    }

    #[test]
    fn test_event_builder() {
        let event = AuditEvent::new("subscriber", "sub-1", AuditOperation::Insert, "test")
            .with_user("admin@example.com")
            .with_correlation("corr-1")
            .with_snapshot(None, Some(serde_json::json!({"email": "a@b.c"})));

        assert_eq!(event.entity_type, "subscriber");
        assert_eq!(event.operation_type, AuditOperation::Insert);
        assert_eq!(event.user_id.as_deref(), Some("admin@example.com"));
        assert!(event.data_snapshot.before.is_none());
        assert!(event.data_snapshot.after.is_some());
    }

    #[test]
    fn test_snapshot_redaction() {
        let snapshot = serde_json::json!({
            "email": "user@example.com",
            "phone": "+12125551234",
            "recipients": ["a@example.com", "+12125550000"],
            "name": "kept"
        });

        let redacted = redact_snapshot(snapshot.clone(), true);
        assert_eq!(redacted["email"], "[REDACTED]@example.com");
        assert_eq!(redacted["phone"], "[REDACTED]");
        assert_eq!(redacted["recipients"][0], "[REDACTED]@example.com");
        assert_eq!(redacted["name"], "kept");

        let untouched = redact_snapshot(snapshot.clone(), false);
        assert_eq!(untouched, snapshot);
    }

    #[test]
    fn test_disabled_sink_is_silent() {
        let sink = TracingAuditSink::new(AuditConfig {
            enabled: false,
            redact_recipients: false,
        });
        // Must not panic with no subscriber installed
        sink.publish(&AuditEvent::new(
            "subscriber",
            "sub-1",
            AuditOperation::Delete,
            "test",
        ));
    }
}
