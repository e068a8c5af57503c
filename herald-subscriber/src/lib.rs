//! Subscriber registry for herald.
//!
//! This crate owns the subscriber records: CRUD with soft-delete, a unique
//! email constraint over live rows, and the four secondary indexes the
//! router queries (status, event type, priority threshold, email).

pub mod memory;
pub mod store;
pub mod types;

pub use memory::MemorySubscriberStore;
pub use store::{ListFilter, SubscriberPage, SubscriberStore};
pub use types::{
    NotificationMethod, Schedule, Subscriber, SubscriberDraft, SubscriberId, SubscriberStatus,
};
