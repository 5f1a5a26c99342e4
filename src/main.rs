use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use worldsync::{
    api::{create_router, AppState},
    config,
    state::SharedState,
    subscription::{Broadcaster, SubscriberRegistry},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "worldsync=info,tower_http=info".into()),
        )
        .init();

    let config = config::load()?;

    info!("worldsync starting...");

    let world = Arc::new(SharedState::new());
    let registry = Arc::new(SubscriberRegistry::new());
    Broadcaster::attach(&world, Arc::clone(&registry));

    let app = create_router(AppState::new(world, registry, &config), &config);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    info!(
        addr = %config.server.bind_addr,
        static_dir = %config.server.static_dir.display(),
        "Listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("worldsync stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
