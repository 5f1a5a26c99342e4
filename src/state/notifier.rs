use crate::state::entity::Record;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::error;

/// Failure reported by a listener. Logged by the notifier, never propagated.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to encode change: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),
}

/// Callback invoked synchronously after every successful mutation.
///
/// Runs while the mutation is still sequenced, so the record passed in is the
/// post-mutation value and `SharedState::get` returns the same. A listener must
/// not call `update` or `set` on the state that invoked it.
pub trait Listener: Send + Sync {
    fn on_change(&self, entity: &str, record: &Record) -> Result<(), ListenerError>;
}

impl<F> Listener for F
where
    F: Fn(&str, &Record) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_change(&self, entity: &str, record: &Record) -> Result<(), ListenerError> {
        self(entity, record)
    }
}

/// Handle returned by `ChangeNotifier::register`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Ordered registry of change listeners
pub struct ChangeNotifier {
    listeners: RwLock<Vec<(ListenerId, Arc<dyn Listener>)>>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a listener. No duplicate detection: registering the same
    /// listener twice makes it run twice.
    pub fn register(&self, listener: Arc<dyn Listener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener in registration order.
    ///
    /// Errors and panics are isolated per listener: each is logged and the
    /// next listener still runs.
    pub fn notify(&self, entity: &str, record: &Record) {
        // Snapshot so a listener may register/unregister without deadlocking
        let listeners: Vec<(ListenerId, Arc<dyn Listener>)> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, listener) in listeners {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| listener.on_change(entity, record)));

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(listener_id = %id, entity = %entity, error = %e, "Listener failed");
                }
                Err(_) => {
                    error!(listener_id = %id, entity = %entity, "Listener panicked");
                }
            }
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
