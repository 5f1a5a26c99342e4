// Authoritative world state and change notification

mod engine;
mod entity;
mod notifier;

pub use engine::SharedState;
pub use entity::{Record, World};
pub use notifier::{ChangeNotifier, Listener, ListenerError, ListenerId};
