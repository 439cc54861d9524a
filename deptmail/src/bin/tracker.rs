//! Deptmail Tracker - open-tracking pixel server.
//!
//! This binary serves:
//! - `GET /open.png` (alias `GET /open`): counts one open, returns a 1x1 PNG
//! - `GET /count`: returns the current open count
//! - `GET /health`: liveness probe
//!
//! Stores are created once at startup and shared by every request.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deptmail::config::{CounterBackend, TrackerConfig};
use deptmail::tracker::{
    router, BlobStore, BuiltinPixelStore, CounterStore, DirBlobStore, MemoryCounterStore,
    RedisCounterStore, TrackerState,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("tracker_starting");

    // Load configuration
    let config = TrackerConfig::from_env().context("Invalid tracker configuration")?;
    info!(
        port = config.port,
        counter_backend = ?config.counter_backend,
        counter_key = %config.counter_key,
        pixel_dir = ?config.pixel_dir,
        pixel_key = %config.pixel_key,
        "config_loaded"
    );

    // Acquire stores once, at cold start
    let counter: Arc<dyn CounterStore> = match config.counter_backend {
        CounterBackend::Redis => Arc::new(
            RedisCounterStore::connect(&config.redis_url)
                .await
                .context("Failed to connect to Redis")?,
        ),
        CounterBackend::Memory => Arc::new(MemoryCounterStore::new()),
    };

    let blobs: Arc<dyn BlobStore> = match &config.pixel_dir {
        Some(dir) => Arc::new(DirBlobStore::new(dir)),
        None => Arc::new(BuiltinPixelStore),
    };

    let state = TrackerState::new(
        counter,
        blobs,
        config.counter_key.as_str(),
        config.pixel_key.as_str(),
    );

    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "tracker_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("tracker_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("tracker_shutting_down");
}
