//! Delivery status tracking.
//!
//! This crate owns every message and status record: the channel handlers
//! write them, the retry sweep and operator surfaces read them. Workers only
//! ever hold transient references while processing.

pub mod memory;
pub mod store;
pub mod types;

pub use memory::MemoryStatusStore;
pub use store::StatusStore;
pub use types::{
    DeliveryStatus, MessageContent, MessageId, NotificationMessage, OverallStatus,
    RecipientStatus,
};
