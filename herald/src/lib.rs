//! The herald service: configuration, event ingest, and wiring.
//!
//! The library ties the pieces together: ingress events are classified and
//! routed by the [`dispatcher::Dispatcher`], which publishes channel
//! requests onto the queues the handler services consume. [`service::Herald`]
//! owns the full lifecycle from configuration to graceful shutdown.

pub mod config;
pub mod dispatcher;
pub mod service;

pub use config::HeraldConfig;
pub use dispatcher::Dispatcher;
pub use service::Herald;
