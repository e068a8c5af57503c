//! Channel dispatch: queues, handlers, workers, and the retry/dead-letter
//! policy.
//!
//! One handler service runs per channel. Each consumes its channel queue,
//! renders and persists messages, hands them to a bounded worker pool, and
//! applies the retry policy on failure. Permanently failed work lands in the
//! dead-letter queue for operator inspection.

pub mod config;
pub mod dead_letter;
pub mod handler;
pub mod queue;
pub mod retry;
pub mod worker;

pub use config::ChannelConfig;
pub use dead_letter::{DeadLetterQueue, DeadLetterRecord};
pub use handler::email::EmailHandlerService;
pub use handler::sms::SmsHandlerService;
pub use handler::{HandlerEnv, HandlerHealth};
pub use queue::{
    EmailNotificationRequest, MemoryQueue, NotificationQueue, QueueMessage,
    SmsNotificationRequest,
};
pub use retry::{FaultClass, RetryPolicy};
pub use worker::{WorkProcessor, WorkerPool};
