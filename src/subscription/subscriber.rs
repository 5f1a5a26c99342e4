use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identity of one streaming connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Receiving end of a subscriber's queue, drained by the connection's writer
pub type Outbound = mpsc::UnboundedReceiver<Arc<str>>;

/// Producer handle for one connection's outbound queue
///
/// Cheap to clone. The queue is unbounded and FIFO: frames reach the wire in
/// the order they were enqueued.
#[derive(Clone, Debug)]
pub struct Subscriber {
    id: SubscriberId,
    queue: mpsc::UnboundedSender<Arc<str>>,
}

impl Subscriber {
    /// Create a subscriber and the receiving half of its queue
    pub fn channel() -> (Self, Outbound) {
        let (queue, outbound) = mpsc::unbounded_channel();
        let subscriber = Self {
            id: SubscriberId::new(),
            queue,
        };
        (subscriber, outbound)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Queue a frame without blocking.
    ///
    /// Returns false if the connection is gone; the frame is dropped.
    pub fn enqueue(&self, frame: Arc<str>) -> bool {
        self.queue.send(frame).is_ok()
    }

    /// True once the receiving half has been dropped
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_preserves_order() {
        let (subscriber, mut outbound) = Subscriber::channel();

        assert!(subscriber.enqueue(Arc::from("one")));
        assert!(subscriber.enqueue(Arc::from("two")));

        assert_eq!(&*outbound.try_recv().unwrap(), "one");
        assert_eq!(&*outbound.try_recv().unwrap(), "two");
        assert!(outbound.try_recv().is_err());
    }

    #[test]
    fn test_enqueue_after_close_is_dropped() {
        let (subscriber, outbound) = Subscriber::channel();
        drop(outbound);

        assert!(subscriber.is_closed());
        assert!(!subscriber.enqueue(Arc::from("lost")));
    }

    #[test]
    fn test_ids_are_unique() {
        let (a, _rx_a) = Subscriber::channel();
        let (b, _rx_b) = Subscriber::channel();
        assert_ne!(a.id(), b.id());
    }
}
