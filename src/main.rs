//! remcall - Remote Filesystem Call Server
//!
//! Executes filesystem calls (open, close, read, write, seek, checksum) on
//! behalf of remote clients over a framed TCP protocol.

use clap::Parser;
use remcall_server::{Config, Server, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "remcall")]
#[command(about = "Remote filesystem call server")]
#[command(version)]
struct Cli {
    /// Port to listen on (overrides configuration)
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration (from file if REMCALL_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("REMCALL_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    let bind_addr = SocketAddr::new(config.network.bind_addr.ip(), cli.port);

    tracing::info!("Starting remcall server");
    tracing::info!("  Bind address: {}", bind_addr);
    tracing::info!("  Max connections: {}", config.network.max_connections);

    let server_config =
        ServerConfig::new(bind_addr).with_max_connections(config.network.max_connections);
    let server = Arc::new(Server::bind(server_config).await?);

    // Spawn shutdown signal handler; the broadcast reaches the accept loop
    // and every live connection task.
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    tracing::info!("Server stopped");
    Ok(())
}
