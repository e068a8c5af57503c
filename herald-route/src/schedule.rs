//! Per-subscriber delivery windows for hourly and daily schedules.
//!
//! Immediate routes bypass this queue entirely. Hourly and daily routes are
//! bucketed by `(subscriber, channel, window start)`; within a window,
//! duplicates of the same event kind collapse to the highest priority seen.

use chrono::{DateTime, Duration, DurationRound, Utc};
use dashmap::DashMap;
use herald_common::{Channel, EventKind, Priority};
use herald_subscriber::{Schedule, SubscriberId};
use serde_json::{Map, Value};

use crate::router::RouteTuple;

/// A routed notification waiting for its delivery window.
#[derive(Debug, Clone)]
pub struct PendingNotification {
    pub route: RouteTuple,
    pub kind: EventKind,
    pub priority: Priority,
    pub data: Map<String, Value>,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    subscriber_id: SubscriberId,
    channel: Channel,
    window_start: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Window {
    window_end: Option<DateTime<Utc>>,
    items: Vec<PendingNotification>,
}

/// Holds scheduled notifications until their window closes.
#[derive(Debug, Default)]
pub struct ScheduledQueue {
    windows: DashMap<WindowKey, Window>,
}

impl ScheduledQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket a notification into its subscriber's window.
    ///
    /// Immediate-schedule routes are returned to the caller untouched for
    /// direct dispatch.
    pub fn add(
        &self,
        notification: PendingNotification,
        now: DateTime<Utc>,
    ) -> Option<PendingNotification> {
        let span = match notification.route.schedule {
            Schedule::Immediate => return Some(notification),
            Schedule::Hourly => Duration::hours(1),
            Schedule::Daily => Duration::days(1),
        };

        let window_start = now.duration_trunc(span).unwrap_or(now);
        let key = WindowKey {
            subscriber_id: notification.route.subscriber_id,
            channel: notification.route.channel,
            window_start,
        };

        let mut window = self.windows.entry(key).or_default();
        window.window_end = Some(window_start + span);

        // Same-kind duplicates collapse to the highest priority seen
        if let Some(existing) = window
            .items
            .iter_mut()
            .find(|item| item.kind == notification.kind)
        {
            if notification.priority > existing.priority {
                *existing = notification;
            }
        } else {
            window.items.push(notification);
        }

        None
    }

    /// Drain every window whose end has passed.
    #[must_use]
    pub fn drain_due(&self, now: DateTime<Utc>) -> Vec<PendingNotification> {
        let due: Vec<WindowKey> = self
            .windows
            .iter()
            .filter(|entry| entry.value().window_end.is_some_and(|end| end <= now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut drained = Vec::new();
        for key in due {
            if let Some((_, window)) = self.windows.remove(&key) {
                drained.extend(window.items);
            }
        }
        drained
    }

    /// Number of notifications currently held across all windows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.iter().map(|entry| entry.value().items.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
