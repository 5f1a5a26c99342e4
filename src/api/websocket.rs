use crate::api::AppState;
use crate::subscription::ConnectionManager;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::StreamExt;
use std::sync::Arc;
use tracing::info;

/// GET /subscribe - WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (writer, reader) = socket.split();

    let manager = ConnectionManager::new(Arc::clone(&state.world), Arc::clone(&state.registry));

    manager.handle(writer, reader).await;
}
