//! The shared domain error taxonomy.
//!
//! Every externally visible failure in herald is a [`DomainError`]: a kind
//! drawn from a closed set, a stable machine-readable code, a human message,
//! optional `field`/`value` details for validation failures, and an optional
//! chained cause. Stores and handler services return these directly; callers
//! branch on the kind via the `is_*` predicates rather than matching on
//! message text.

use std::fmt;

/// The closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller input failed validation.
    Validation,
    /// A referenced entity does not exist.
    NotFound,
    /// A unique-key constraint was violated.
    Conflict,
    /// Caller is not authenticated.
    Unauthorized,
    /// Caller is authenticated but not allowed.
    Forbidden,
    /// Unexpected internal failure.
    Internal,
    /// An operation exceeded its deadline.
    Timeout,
    /// An upstream rate limit was hit.
    RateLimit,
    /// An external system failed.
    Dependency,
}

impl ErrorKind {
    /// Stable machine-readable code for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::Internal => "INTERNAL_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::RateLimit => "RATE_LIMITED",
            Self::Dependency => "DEPENDENCY_FAILED",
        }
    }
}

/// A domain error with a stable code and optional chained cause.
#[derive(Debug)]
pub struct DomainError {
    kind: ErrorKind,
    message: String,
    field: Option<String>,
    value: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DomainError {
    /// Create an error of an arbitrary kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
            value: None,
            source: None,
        }
    }

    /// Caller input failed validation.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// A referenced entity does not exist.
    #[must_use]
    pub fn not_found(entity: &str, id: impl fmt::Display) -> Self {
        Self::new(ErrorKind::NotFound, format!("{entity} not found: {id}"))
    }

    /// A unique-key constraint was violated.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Unexpected internal failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// An operation exceeded its deadline.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// An upstream rate limit was hit.
    #[must_use]
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, message)
    }

    /// An external system failed.
    #[must_use]
    pub fn dependency(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Dependency, message)
    }

    /// Attach the offending field and value (validation errors).
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self.value = Some(value.into());
        self
    }

    /// Attach a chained cause.
    #[must_use]
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The failure kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The offending field, when known.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// The offending value, when known.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self.kind, ErrorKind::Validation)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.kind, ErrorKind::Conflict)
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self.kind, ErrorKind::Internal)
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    #[must_use]
    pub const fn is_rate_limit(&self) -> bool {
        matches!(self.kind, ErrorKind::RateLimit)
    }

    #[must_use]
    pub const fn is_dependency(&self) -> bool {
        matches!(self.kind, ErrorKind::Dependency)
    }

    /// Wrap an unexpected error as `Internal`, preserving the cause.
    ///
    /// Domain-typed errors pass through unchanged so upstream predicates
    /// keep working.
    #[must_use]
    pub fn wrap_internal(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        let error = error.into();
        Self {
            kind: ErrorKind::Internal,
            message: error.to_string(),
            field: None,
            value: None,
            source: Some(error),
        }
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message)?;
        if let Some(field) = &self.field {
            write!(f, " (field: {field}")?;
            if let Some(value) = &self.value {
                write!(f, ", value: {value}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for DomainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

/// Specialized `Result` type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;

    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorKind::Validation.code(), "VALIDATION_ERROR");
        assert_eq!(ErrorKind::NotFound.code(), "NOT_FOUND");
        assert_eq!(ErrorKind::Conflict.code(), "CONFLICT");
        assert_eq!(ErrorKind::Dependency.code(), "DEPENDENCY_FAILED");
        assert_eq!(ErrorKind::RateLimit.code(), "RATE_LIMITED");
    }

    #[test]
    fn test_validation_with_field() {
        let err = DomainError::validation("email must be unique")
            .with_field("email", "dup@example.com");

        assert!(err.is_validation());
        assert_eq!(err.field(), Some("email"));
        assert_eq!(err.value(), Some("dup@example.com"));
        assert_eq!(
            err.to_string(),
            "VALIDATION_ERROR: email must be unique (field: email, value: dup@example.com)"
        );
    }

    #[test]
    fn test_not_found_display() {
        let err = DomainError::not_found("subscriber", "abc-123");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "NOT_FOUND: subscriber not found: abc-123");
    }

    #[test]
    fn test_source_chain_preserved() {
        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline exceeded");
        let err = DomainError::dependency("backing store probe failed").with_source(io_err);

        assert!(err.is_dependency());
        assert!(err.source().is_some());
        assert!(err.source().unwrap().to_string().contains("deadline"));
    }

    #[test]
    fn test_wrap_internal_keeps_cause() {
        let io_err = std::io::Error::other("boom");
        let err = DomainError::wrap_internal(io_err);

        assert!(err.is_internal());
        assert_eq!(err.message(), "boom");
        assert!(err.source().is_some());
    }
}
