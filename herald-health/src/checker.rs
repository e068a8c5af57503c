//! Health check logic

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

/// Health checker that tracks system component status
///
/// This struct provides thread-safe health status tracking for the herald
/// components (subscriber store, status store, channel handlers, queue).
#[derive(Debug)]
pub struct HealthChecker {
    /// Whether the subscriber store answers its probe
    subscribers_ready: Arc<AtomicBool>,

    /// Whether the delivery-status store answers its probe
    status_store_ready: Arc<AtomicBool>,

    /// Whether the email handler reports healthy
    email_ready: Arc<AtomicBool>,

    /// Whether the SMS handler reports healthy
    sms_ready: Arc<AtomicBool>,

    /// Current total queued work across all worker pools
    queue_size: Arc<AtomicU64>,

    /// Maximum queued work threshold for readiness
    max_queue_size: u64,
}

impl HealthChecker {
    /// Create a new health checker with the specified maximum queue size
    #[must_use]
    pub fn new(max_queue_size: u64) -> Self {
        Self {
            subscribers_ready: Arc::new(AtomicBool::new(false)),
            status_store_ready: Arc::new(AtomicBool::new(false)),
            email_ready: Arc::new(AtomicBool::new(false)),
            sms_ready: Arc::new(AtomicBool::new(false)),
            queue_size: Arc::new(AtomicU64::new(0)),
            max_queue_size,
        }
    }

    /// Mark the subscriber store as ready
    pub fn set_subscribers_ready(&self, ready: bool) {
        self.subscribers_ready.store(ready, Ordering::Relaxed);
        tracing::debug!(ready, "Subscriber store readiness updated");
    }

    /// Mark the delivery-status store as ready
    pub fn set_status_store_ready(&self, ready: bool) {
        self.status_store_ready.store(ready, Ordering::Relaxed);
        tracing::debug!(ready, "Status store readiness updated");
    }

    /// Mark the email handler as ready
    pub fn set_email_ready(&self, ready: bool) {
        self.email_ready.store(ready, Ordering::Relaxed);
        tracing::debug!(ready, "Email handler readiness updated");
    }

    /// Mark the SMS handler as ready
    pub fn set_sms_ready(&self, ready: bool) {
        self.sms_ready.store(ready, Ordering::Relaxed);
        tracing::debug!(ready, "SMS handler readiness updated");
    }

    /// Update the current queued-work size
    pub fn set_queue_size(&self, size: u64) {
        self.queue_size.store(size, Ordering::Relaxed);
    }

    /// Check if the application is alive
    ///
    /// For liveness, we just need to respond. If we can't respond, the HTTP
    /// server itself is dead, which the orchestrator detects via timeout.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        true
    }

    /// Check if the application is ready to accept traffic
    ///
    /// Returns true if all components are ready and queued work is below the
    /// threshold.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        let subscribers_ok = self.subscribers_ready.load(Ordering::Relaxed);
        let status_store_ok = self.status_store_ready.load(Ordering::Relaxed);
        let email_ok = self.email_ready.load(Ordering::Relaxed);
        let sms_ok = self.sms_ready.load(Ordering::Relaxed);
        let current_queue = self.queue_size.load(Ordering::Relaxed);
        let queue_ok = current_queue < self.max_queue_size;

        let ready = subscribers_ok && status_store_ok && email_ok && sms_ok && queue_ok;

        if !ready {
            tracing::debug!(
                subscribers_ready = subscribers_ok,
                status_store_ready = status_store_ok,
                email_ready = email_ok,
                sms_ready = sms_ok,
                queue_size = current_queue,
                max_queue_size = self.max_queue_size,
                "Readiness check failed"
            );
        }

        ready
    }

    /// Get detailed readiness status for debugging
    #[must_use]
    pub fn get_status(&self) -> HealthStatus {
        HealthStatus {
            alive: self.is_alive(),
            ready: self.is_ready(),
            subscribers_ready: self.subscribers_ready.load(Ordering::Relaxed),
            status_store_ready: self.status_store_ready.load(Ordering::Relaxed),
            email_ready: self.email_ready.load(Ordering::Relaxed),
            sms_ready: self.sms_ready.load(Ordering::Relaxed),
            queue_size: self.queue_size.load(Ordering::Relaxed),
            max_queue_size: self.max_queue_size,
        }
    }
}

/// Detailed health status information
#[derive(Debug, Clone, serde::Serialize)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "Status struct intentionally has multiple boolean fields for clarity"
)]
pub struct HealthStatus {
    /// Whether the application is alive
    pub alive: bool,

    /// Whether the application is ready
    pub ready: bool,

    /// Whether the subscriber store is ready
    pub subscribers_ready: bool,

    /// Whether the status store is ready
    pub status_store_ready: bool,

    /// Whether the email handler is ready
    pub email_ready: bool,

    /// Whether the SMS handler is ready
    pub sms_ready: bool,

    /// Current queued work
    pub queue_size: u64,

    /// Maximum queued-work threshold
    pub max_queue_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_until_all_components_are() {
        let checker = HealthChecker::new(100);
        assert!(checker.is_alive());
        assert!(!checker.is_ready());

        checker.set_subscribers_ready(true);
        checker.set_status_store_ready(true);
        checker.set_email_ready(true);
        assert!(!checker.is_ready());

        checker.set_sms_ready(true);
        assert!(checker.is_ready());
    }

    #[test]
    fn test_saturated_queue_fails_readiness() {
        let checker = HealthChecker::new(10);
        checker.set_subscribers_ready(true);
        checker.set_status_store_ready(true);
        checker.set_email_ready(true);
        checker.set_sms_ready(true);

        checker.set_queue_size(10);
        assert!(!checker.is_ready());

        checker.set_queue_size(9);
        assert!(checker.is_ready());
    }

    #[test]
    fn test_status_snapshot() {
        let checker = HealthChecker::new(100);
        checker.set_email_ready(true);
        checker.set_queue_size(5);

        let status = checker.get_status();
        assert!(status.alive);
        assert!(!status.ready);
        assert!(status.email_ready);
        assert!(!status.sms_ready);
        assert_eq!(status.queue_size, 5);
        assert_eq!(status.max_queue_size, 100);
    }
}
