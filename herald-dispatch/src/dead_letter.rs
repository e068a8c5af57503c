//! Dead-letter queue.
//!
//! Records are terminal: nothing here re-enters the main queues
//! automatically. The queue is kept in memory until operator inspection,
//! with `list`/`len`/`purge` as the operator surface.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Reason tag for a dead-lettered SMS.
pub const SMS_PROCESSING_FAILED: &str = "sms_processing_failed";

/// Reason tag for a dead-lettered email.
pub const EMAIL_PROCESSING_FAILED: &str = "email_processing_failed";

/// One dead-lettered request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    /// The original request, as JSON, for replay tooling.
    pub original_request: Value,
    pub error: String,
    pub timestamp: DateTime<Utc>,
    pub worker_id: usize,
    pub reason: String,
}

/// In-memory dead-letter queue shared by every handler.
#[derive(Debug, Default)]
pub struct DeadLetterQueue {
    records: Mutex<Vec<DeadLetterRecord>>,
}

impl DeadLetterQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a dead letter.
    pub fn record(
        &self,
        original_request: Value,
        error: impl Into<String>,
        worker_id: usize,
        reason: &str,
    ) {
        let record = DeadLetterRecord {
            original_request,
            error: error.into(),
            timestamp: Utc::now(),
            worker_id,
            reason: reason.to_string(),
        };

        warn!(
            worker_id = record.worker_id,
            reason = %record.reason,
            error = %record.error,
            "Message dead-lettered"
        );

        self.records.lock().push(record);
    }

    /// Snapshot of all records, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<DeadLetterRecord> {
        self.records.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all records after operator inspection.
    pub fn purge(&self) -> usize {
        let mut records = self.records.lock();
        let drained = records.len();
        records.clear();
        drained
    }
}
