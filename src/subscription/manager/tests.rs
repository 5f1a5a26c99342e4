use super::*;
use crate::subscription::Broadcaster;
use futures::channel::mpsc;
use serde_json::{json, Value};
use std::io;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

/// Client side of an in-process connection
struct Peer {
    to_server: mpsc::UnboundedSender<Result<Message, io::Error>>,
    from_server: mpsc::UnboundedReceiver<Message>,
    task: JoinHandle<CloseReason>,
}

impl Peer {
    fn connect(state: &Arc<SharedState>, registry: &Arc<SubscriberRegistry>) -> Self {
        let (server_writer, from_server) = mpsc::unbounded();
        let (to_server, server_reader) = mpsc::unbounded();
        let manager = ConnectionManager::new(Arc::clone(state), Arc::clone(registry));
        let task = tokio::spawn(manager.handle(server_writer, server_reader));
        Self {
            to_server,
            from_server,
            task,
        }
    }

    async fn next_frame(&mut self) -> Value {
        let message = timeout(WAIT, self.from_server.next())
            .await
            .expect("timed out waiting for frame")
            .expect("server closed the stream");
        match message {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected message {other:?}"),
        }
    }

    fn send_text(&self, text: &str) {
        self.to_server
            .unbounded_send(Ok(Message::Text(text.to_string())))
            .unwrap();
    }

    async fn closed(self) -> CloseReason {
        timeout(WAIT, self.task)
            .await
            .expect("connection did not close")
            .unwrap()
    }
}

fn setup() -> (Arc<SharedState>, Arc<SubscriberRegistry>) {
    let state = Arc::new(SharedState::new());
    let registry = Arc::new(SubscriberRegistry::new());
    Broadcaster::attach(&state, Arc::clone(&registry));
    (state, registry)
}

/// Poll until the registry reaches `expected` members
async fn wait_for_members(registry: &SubscriberRegistry, expected: usize) {
    timeout(WAIT, async {
        while registry.len() != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("registry did not settle");
}

#[tokio::test]
async fn test_first_frame_is_world_snapshot() {
    let (state, registry) = setup();
    state.update("ball", "x", json!(1));
    state.update("wall", "h", json!(4));

    let mut peer = Peer::connect(&state, &registry);

    assert_eq!(
        peer.next_frame().await,
        json!({"ball": {"x": 1}, "wall": {"h": 4}})
    );
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_empty_world_snapshot() {
    let (state, registry) = setup();

    let mut peer = Peer::connect(&state, &registry);

    assert_eq!(peer.next_frame().await, json!({}));
}

#[tokio::test]
async fn test_changes_arrive_in_mutation_order() {
    let (state, registry) = setup();
    let mut peer = Peer::connect(&state, &registry);
    peer.next_frame().await;

    state.update("ball", "x", json!(1));
    state.update("ball", "y", json!(2));
    state.set("wall", json!({"h": 3}).as_object().cloned().unwrap());

    assert_eq!(peer.next_frame().await, json!({"ball": {"x": 1}}));
    assert_eq!(peer.next_frame().await, json!({"ball": {"x": 1, "y": 2}}));
    assert_eq!(peer.next_frame().await, json!({"wall": {"h": 3}}));
}

#[tokio::test]
async fn test_client_frame_replaces_records_and_is_broadcast() {
    let (state, registry) = setup();
    state.update("ball", "x", json!(1));
    state.update("ball", "y", json!(2));

    let mut writer = Peer::connect(&state, &registry);
    let mut watcher = Peer::connect(&state, &registry);
    writer.next_frame().await;
    watcher.next_frame().await;

    writer.send_text(r#"{"ball": {"colour": "red"}}"#);

    let expected = json!({"ball": {"colour": "red"}});
    assert_eq!(watcher.next_frame().await, expected);
    // The sender sees its own write like everyone else
    assert_eq!(writer.next_frame().await, expected);
    assert_eq!(
        Value::Object(state.get("ball")),
        json!({"colour": "red"})
    );
}

#[tokio::test]
async fn test_malformed_frames_are_skipped() {
    let (state, registry) = setup();
    let mut peer = Peer::connect(&state, &registry);
    peer.next_frame().await;

    peer.send_text("{not json");
    peer.send_text("[1, 2, 3]");
    peer.send_text(r#"{"ball": 5}"#);
    peer.send_text(r#"{"ball": {"x": 9}}"#);

    // Only the valid frame produced a change, and the connection stayed up
    assert_eq!(peer.next_frame().await, json!({"ball": {"x": 9}}));
    assert_eq!(registry.len(), 1);
    assert_eq!(state.len(), 1);
}

#[tokio::test]
async fn test_binary_and_ping_frames() {
    let (state, registry) = setup();
    let mut peer = Peer::connect(&state, &registry);
    peer.next_frame().await;

    peer.to_server
        .unbounded_send(Ok(Message::Ping(vec![1, 2])))
        .unwrap();
    peer.to_server
        .unbounded_send(Ok(Message::Binary(br#"{"b": {"n": 1}}"#.to_vec())))
        .unwrap();

    assert_eq!(peer.next_frame().await, json!({"b": {"n": 1}}));
}

#[tokio::test]
async fn test_peer_disconnect_removes_subscriber() {
    let (state, registry) = setup();
    let mut peer = Peer::connect(&state, &registry);
    peer.next_frame().await;
    assert_eq!(registry.len(), 1);

    drop(peer.to_server);
    let reason = timeout(WAIT, peer.task).await.unwrap().unwrap();

    assert_eq!(reason, CloseReason::PeerClosed);
    assert!(registry.is_empty());

    // Mutations after the close go nowhere and do not fail
    state.update("ball", "x", json!(1));
}

#[tokio::test]
async fn test_close_frame_ends_connection() {
    let (state, registry) = setup();
    let mut peer = Peer::connect(&state, &registry);
    peer.next_frame().await;

    peer.to_server
        .unbounded_send(Ok(Message::Close(None)))
        .unwrap();

    assert_eq!(peer.closed().await, CloseReason::PeerClosed);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_read_error_closes_connection() {
    let (state, registry) = setup();
    let mut peer = Peer::connect(&state, &registry);
    peer.next_frame().await;

    peer.to_server
        .unbounded_send(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
        .unwrap();

    assert!(matches!(peer.closed().await, CloseReason::ReadError(_)));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_write_failure_only_affects_that_subscriber() {
    let (state, registry) = setup();
    let mut broken = Peer::connect(&state, &registry);
    let mut healthy = Peer::connect(&state, &registry);
    broken.next_frame().await;
    healthy.next_frame().await;

    // Dropping the receiving side makes the next server write fail
    let Peer {
        to_server: _keep_open,
        from_server,
        task,
    } = broken;
    drop(from_server);

    state.update("ball", "x", json!(1));
    state.update("ball", "y", json!(2));

    let reason = timeout(WAIT, task).await.unwrap().unwrap();
    assert!(matches!(reason, CloseReason::WriteError(_)));

    assert_eq!(healthy.next_frame().await, json!({"ball": {"x": 1}}));
    assert_eq!(healthy.next_frame().await, json!({"ball": {"x": 1, "y": 2}}));
    wait_for_members(&registry, 1).await;
}

#[tokio::test]
async fn test_abort_still_unregisters() {
    let (state, registry) = setup();
    let mut peer = Peer::connect(&state, &registry);
    peer.next_frame().await;

    peer.task.abort();
    let _ = peer.task.await;

    assert!(registry.is_empty());
}
