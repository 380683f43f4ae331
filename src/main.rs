//! Pong Match Server
//!
//! Serves pong matches over WebSocket until Ctrl-C.

use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pong_match::{GameServer, ServerConfig, TICK_RATE, VERSION, WINNING_SCORE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();

    info!("Pong Match Server v{}", VERSION);
    info!("Tick Rate: {} Hz, first to {} wins", TICK_RATE, WINNING_SCORE);
    info!("Binding {}", config.bind_addr);

    let server = Arc::new(GameServer::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal_server.shutdown();
            }
            Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
        }
    });

    server.run().await?;
    info!("Server stopped");

    Ok(())
}
