// Subscriber fan-out: per-connection queues, the live registry, and the
// listener that broadcasts every state change

pub mod broadcaster;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod subscriber;

pub use broadcaster::Broadcaster;
pub use manager::{CloseReason, ConnectionManager};
pub use protocol::{decode_frame, encode_change, encode_world, DecodeError};
pub use registry::{Registration, SubscriberRegistry};
pub use subscriber::{Outbound, Subscriber, SubscriberId};
