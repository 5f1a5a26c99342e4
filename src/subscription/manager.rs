use crate::state::SharedState;
use crate::subscription::protocol::{decode_frame, encode_world};
use crate::subscription::registry::{Registration, SubscriberRegistry};
use crate::subscription::subscriber::{Outbound, Subscriber, SubscriberId};
use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Close frame or end of stream from the peer
    PeerClosed,
    /// Transport failure while reading
    ReadError(String),
    /// Transport failure while writing
    WriteError(String),
}

/// Drives one subscriber connection from accept to close
///
/// The writer and reader are the two halves of the transport (for a live
/// socket, `WebSocket::split`). On accept the current world is queued as the
/// first frame and the subscriber is registered in the same step, so nothing
/// is missed or repeated between the snapshot and the first change. Two loops
/// then run together until either ends:
/// - outbound: drain the queue to the writer in order
/// - inbound: apply each client frame via `SharedState::set`
///
/// Whichever loop finishes first cancels the other, and the registry entry is
/// removed exactly once.
pub struct ConnectionManager {
    state: Arc<SharedState>,
    registry: Arc<SubscriberRegistry>,
}

impl ConnectionManager {
    pub fn new(state: Arc<SharedState>, registry: Arc<SubscriberRegistry>) -> Self {
        Self { state, registry }
    }

    /// Handle the connection lifecycle until it closes
    pub async fn handle<W, R, E>(self, mut writer: W, mut reader: R) -> CloseReason
    where
        W: Sink<Message> + Unpin + Send,
        W::Error: Display,
        R: Stream<Item = Result<Message, E>> + Unpin + Send,
        E: Display + Send,
    {
        let (subscriber, mut outbound) = Subscriber::channel();
        let id = subscriber.id();

        let registration = match self.register(subscriber) {
            Ok(registration) => registration,
            Err(e) => {
                error!(subscriber_id = %id, error = %e, "Failed to encode initial world");
                return CloseReason::WriteError(e.to_string());
            }
        };

        info!(
            subscriber_id = %id,
            subscribers = self.registry.len(),
            "Subscriber connected"
        );

        let reason = tokio::select! {
            reason = drain(&mut writer, &mut outbound) => reason,
            reason = self.apply_inbound(&mut reader, id) => reason,
        };

        drop(registration);
        drop(outbound);

        if reason == CloseReason::PeerClosed {
            // Best effort; the peer may already be gone
            let _ = writer.close().await;
        }

        match &reason {
            CloseReason::PeerClosed => {
                info!(subscriber_id = %id, "Subscriber disconnected");
            }
            CloseReason::ReadError(e) | CloseReason::WriteError(e) => {
                warn!(subscriber_id = %id, error = %e, "Subscriber connection failed");
            }
        }

        reason
    }

    /// Queue the snapshot frame and join the registry with mutations held off
    fn register(&self, subscriber: Subscriber) -> Result<Registration, serde_json::Error> {
        self.state.with_snapshot(|world| {
            let frame = encode_world(world)?;
            subscriber.enqueue(frame);
            Ok(Registration::new(Arc::clone(&self.registry), subscriber))
        })
    }

    /// Inbound loop: read client frames and apply them
    async fn apply_inbound<R, E>(&self, reader: &mut R, id: SubscriberId) -> CloseReason
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        while let Some(frame) = reader.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!(subscriber_id = %id, "Dropping non UTF-8 binary frame");
                        continue;
                    }
                },
                Ok(Message::Close(_)) => return CloseReason::PeerClosed,
                Ok(_) => continue,
                Err(e) => return CloseReason::ReadError(e.to_string()),
            };

            match decode_frame(&text) {
                Ok(changes) => {
                    debug!(subscriber_id = %id, entities = changes.len(), "Applying client frame");
                    for (entity, record) in changes {
                        self.state.set(&entity, record);
                    }
                }
                Err(e) => {
                    warn!(subscriber_id = %id, error = %e, "Dropping malformed frame");
                }
            }
        }

        CloseReason::PeerClosed
    }
}

/// Outbound loop: write queued frames to the wire in order
async fn drain<W>(writer: &mut W, outbound: &mut Outbound) -> CloseReason
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    // The sender lives in the registry until this connection removes it, so
    // the queue cannot close while we are draining it.
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = writer.send(Message::Text(frame.to_string())).await {
            return CloseReason::WriteError(e.to_string());
        }
    }

    CloseReason::PeerClosed
}

#[cfg(test)]
mod tests;
