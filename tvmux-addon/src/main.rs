//! tvmux addon - Main entry point
//!
//! Thin HTTP surface over the tvmux core: serves the addon manifest and the
//! catalog/meta/stream endpoints. All catalog semantics live in tvmux-core;
//! this binary only wires configuration, logging and routing.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tvmux_addon::api;
use tvmux_core::{ChannelService, ProviderConfig};

/// Command-line arguments for tvmux-addon
#[derive(Parser, Debug)]
#[command(name = "tvmux-addon")]
#[command(about = "Live TV addon service for tvmux")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7000", env = "TVMUX_PORT")]
    port: u16,

    /// Configuration file (TOML); defaults to the platform config location
    #[arg(short, long, env = "TVMUX_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tvmux_addon=debug,tvmux_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = ProviderConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Provider configuration incomplete")?;

    info!("Starting tvmux addon on port {}", args.port);

    let service = Arc::new(
        ChannelService::new(&config).context("Failed to initialize channel service")?,
    );

    let app_state = api::AppState {
        service,
        port: args.port,
    };
    let app = api::create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
