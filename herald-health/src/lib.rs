//! Liveness and readiness probes for the herald service.
//!
//! Health failures are ordinary [`herald_common::DomainError`]s: a bind
//! failure is a `Dependency` error, a bad probe configuration is
//! `Validation`, a server runtime fault is `Internal`.

pub mod checker;
pub mod config;
pub mod server;

pub use checker::{HealthChecker, HealthStatus};
pub use config::HealthConfig;
pub use server::HealthServer;
