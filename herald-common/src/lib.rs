//! Shared foundation for the herald notification dispatch backend.
//!
//! This crate provides the pieces every other herald crate builds on:
//! the domain error taxonomy, the ingress event model and classifier,
//! recipient validators and SMS shaping, correlation context, audit
//! egress, and logging initialisation.

pub mod address;
pub mod audit;
pub mod classify;
pub mod context;
pub mod error;
pub mod event;
pub mod logging;
pub mod text;

pub use error::{DomainError, ErrorKind};
pub use event::{DomainEvent, EventKind, OperationType, Priority};
pub use tracing;

/// Shutdown signalling distributed to every long-running component.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
    Finalised,
}

/// A transport kind. Every routed notification travels over exactly one.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    /// The lowercase wire name, also used as the queue-name suffix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
