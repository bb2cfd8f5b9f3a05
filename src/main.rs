// src/main.rs
// lumen-server entry point

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lumen_backend::api::router::build_router;
use lumen_backend::config::LumenConfig;
use lumen_backend::state::AppState;

#[derive(Parser)]
#[command(name = "lumen-server", about = "Local-first AI chat and workspace backend")]
struct Cli {
    /// Bind host (overrides LUMEN_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides LUMEN_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Data directory (overrides LUMEN_DATA_DIR)
    #[arg(long)]
    data_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = LumenConfig::from_env();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(data_dir) = cli.data_dir {
        config.server.data_dir = data_dir;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_filter())),
        )
        .init();

    info!("Starting lumen-server ({:?})", config.server.environment);

    let bind_address = config.server.bind_address();
    let state = Arc::new(AppState::init(config).await?);

    let router = build_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on {bind_address}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
