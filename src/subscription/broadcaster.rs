use crate::state::{Listener, ListenerError, ListenerId, Record, SharedState};
use crate::subscription::protocol::encode_change;
use crate::subscription::registry::SubscriberRegistry;
use std::sync::Arc;
use tracing::trace;

/// Listener that fans every state change out to all live subscribers
///
/// Encodes the change once and enqueues the same frame on each subscriber's
/// queue. Enqueueing never blocks, so a slow connection cannot stall a
/// mutation.
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }

    /// Register a broadcaster for `registry` on `state`
    pub fn attach(state: &SharedState, registry: Arc<SubscriberRegistry>) -> ListenerId {
        state.notifier().register(Arc::new(Self::new(registry)))
    }
}

impl Listener for Broadcaster {
    fn on_change(&self, entity: &str, record: &Record) -> Result<(), ListenerError> {
        let frame = encode_change(entity, record)?;

        let mut delivered = 0usize;
        self.registry.for_each(|subscriber| {
            if subscriber.enqueue(Arc::clone(&frame)) {
                delivered += 1;
            }
        });

        trace!(entity = %entity, subscribers = delivered, "Change broadcast");
        Ok(())
    }
}
