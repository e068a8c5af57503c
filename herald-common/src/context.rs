//! Correlation context propagated through the dispatch pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation identifiers attached to every operation flowing through the
/// pipeline, from ingress event to provider call to audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationContext {
    pub correlation_id: String,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub environment: String,
}

impl CorrelationContext {
    /// Create a context with a freshly generated correlation id.
    #[must_use]
    pub fn generate(environment: impl Into<String>) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            trace_id: None,
            user_id: None,
            environment: environment.into(),
        }
    }

    /// Adopt an upstream correlation id when present, generating one
    /// otherwise.
    #[must_use]
    pub fn ensure(
        correlation_id: Option<&str>,
        environment: impl Into<String>,
    ) -> Self {
        match correlation_id {
            Some(id) if !id.is_empty() => Self {
                correlation_id: id.to_string(),
                trace_id: None,
                user_id: None,
                environment: environment.into(),
            },
            _ => Self::generate(environment),
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_trace(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_adopts_upstream_id() {
        let ctx = CorrelationContext::ensure(Some("corr-42"), "test");
        assert_eq!(ctx.correlation_id, "corr-42");
        assert_eq!(ctx.environment, "test");
    }

    #[test]
    fn test_ensure_generates_when_absent_or_empty() {
        let generated = CorrelationContext::ensure(None, "test");
        assert!(!generated.correlation_id.is_empty());

        let from_empty = CorrelationContext::ensure(Some(""), "test");
        assert!(!from_empty.correlation_id.is_empty());
        assert_ne!(generated.correlation_id, from_empty.correlation_id);
    }
}
