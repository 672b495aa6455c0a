//! Watch Party - Sync Server
//!
//! Thin WebSocket shell over `party-core`: one task per connection, a
//! room-creation helper endpoint, and a health check.
//!
//! Usage:
//!   cargo run --release
//!   cargo run --release -- --host 0.0.0.0 --port 9090

mod http;
mod signal;
mod ws;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::trace::TraceLayer;

use party_core::{RoomRegistry, SyncEngine, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "party-server")]
#[command(about = "Watch-party room synchronization server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,
}

/// Shared application state handed to every handler.
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub engine: SyncEngine,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "party_server=info,party_core=info".into()),
        )
        .init();

    let args = Args::parse();

    let clock = Arc::new(SystemClock);
    let state = Arc::new(AppState {
        registry: Arc::new(RoomRegistry::new(clock.clone())),
        engine: SyncEngine::new(clock),
    });

    let app = Router::new()
        .route("/ws", get(ws::websocket_handler))
        .route("/create-room", post(http::create_room))
        .route("/", get(http::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let bind_addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    tracing::info!("connect to: ws://{}/ws", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(signal::shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}
