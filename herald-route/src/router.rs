//! The router: classified event in, per-channel delivery tuples out.

use std::collections::HashSet;
use std::sync::Arc;

use herald_common::{Channel, DomainError};
use herald_subscriber::{Schedule, SubscriberId, SubscriberStore};
use tracing::debug;

use crate::ClassifiedEvent;

/// One unit of routed work: a subscriber, the channel to reach them on, and
/// the resolved recipient address for that channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTuple {
    pub subscriber_id: SubscriberId,
    pub channel: Channel,
    pub recipient: String,
    pub schedule: Schedule,
}

/// Computes the delivery set for a classified event.
///
/// Pure with respect to (event, subscribers); safe to call concurrently.
#[derive(Clone)]
pub struct Router {
    store: Arc<dyn SubscriberStore>,
}

impl Router {
    #[must_use]
    pub fn new(store: Arc<dyn SubscriberStore>) -> Self {
        Self { store }
    }

    /// Compute `{subscriber, channel, recipient}` tuples for an event.
    ///
    /// Candidates are the intersection of the event-type and priority
    /// indexes; each candidate contributes one tuple per subscribed channel
    /// for which it has an address.
    ///
    /// # Errors
    /// Propagates subscriber store failures.
    pub async fn compute_routes(
        &self,
        event: &ClassifiedEvent,
    ) -> Result<Vec<RouteTuple>, DomainError> {
        let by_kind = self.store.get_by_event_type(event.kind).await?;
        let by_priority = self.store.get_by_priority(event.priority).await?;

        let admitted: HashSet<SubscriberId> =
            by_priority.into_iter().map(|subscriber| subscriber.id).collect();

        let mut tuples = Vec::new();
        for subscriber in by_kind {
            if !admitted.contains(&subscriber.id) {
                continue;
            }

            for channel in &subscriber.channels {
                match subscriber.recipient_for(*channel) {
                    Some(recipient) if !recipient.is_empty() => tuples.push(RouteTuple {
                        subscriber_id: subscriber.id,
                        channel: *channel,
                        recipient: recipient.to_string(),
                        schedule: subscriber.schedule,
                    }),
                    _ => debug!(
                        subscriber_id = %subscriber.id,
                        channel = %channel,
                        "Subscriber lacks an address for channel, skipping"
                    ),
                }
            }
        }

        Ok(tuples)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}
