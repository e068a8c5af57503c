//! Routing: from a classified event to per-channel delivery tuples.
//!
//! The renderer and router here are pure with respect to their inputs; the
//! schedule queue is the only stateful piece, holding hourly/daily windows
//! until the dispatcher drains them.

pub mod render;
pub mod router;
pub mod schedule;

use herald_common::classify::classify;
use herald_common::{DomainEvent, EventKind, Priority};

pub use render::{EmailContent, render_email, render_sms};
pub use router::{RouteTuple, Router};
pub use schedule::{PendingNotification, ScheduledQueue};

/// A domain event together with its derived kind and priority.
#[derive(Debug, Clone)]
pub struct ClassifiedEvent {
    pub kind: EventKind,
    pub priority: Priority,
    pub event: DomainEvent,
}

impl ClassifiedEvent {
    /// Classify a raw ingress event.
    #[must_use]
    pub fn from_event(event: DomainEvent) -> Self {
        let (kind, priority) = classify(&event);
        Self {
            kind,
            priority,
            event,
        }
    }
}
