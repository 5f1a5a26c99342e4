// HTTP and WebSocket APIs

mod body;
mod error;
mod websocket;
mod world;

pub use body::decode_update;
pub use error::ApiError;
pub use websocket::ws_handler;

use crate::config::WorldSyncConfig;
use crate::state::SharedState;
use crate::subscription::SubscriberRegistry;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Shared application state for every handler
#[derive(Clone)]
pub struct AppState {
    pub world: Arc<SharedState>,
    pub registry: Arc<SubscriberRegistry>,
    /// Largest accepted update body
    pub max_body_bytes: usize,
    /// Where `GET /` redirects
    pub client_page: String,
}

impl AppState {
    pub fn new(
        world: Arc<SharedState>,
        registry: Arc<SubscriberRegistry>,
        config: &WorldSyncConfig,
    ) -> Self {
        Self {
            world,
            registry,
            max_body_bytes: config.api.max_body_bytes,
            client_page: format!("{}/index.html", config.server.static_route),
        }
    }
}

/// Create the full router: world API, subscribe socket and static client
pub fn create_router(state: AppState, config: &WorldSyncConfig) -> Router {
    let router = Router::new()
        .route("/", get(world::redirect_to_client))
        .route(
            "/entity/:id",
            get(world::get_entity)
                .post(world::update_entity)
                .put(world::update_entity),
        )
        .route("/world", get(world::get_world).post(world::get_world))
        .route("/clear", get(world::clear_world).post(world::clear_world))
        .route("/subscribe", get(ws_handler))
        .nest_service(
            &config.server.static_route,
            ServeDir::new(&config.server.static_dir),
        )
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http());

    if config.api.cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
