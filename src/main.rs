//! Edge bridge CLI entry point.
//!
//! This is the main entry point for serving a worker deployment over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edge_bridge_common::ConfigFile;
use edge_bridge_server::{AppState, BridgeServer, ServerConfig};

/// Serve an edge worker deployment over HTTP.
#[derive(Debug, Parser)]
#[command(name = "edge-bridge", version, about)]
struct Cli {
    /// Path to the TOML deployment config.
    #[arg(short, long, env = "EDGE_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the guest module, overriding the config file.
    #[arg(short, long)]
    module: Option<PathBuf>,

    /// Bind address, overriding the config file.
    #[arg(short, long, env = "EDGE_BRIDGE_BIND")]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,edge_bridge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Edge Bridge");

    // Load configuration
    let mut file = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    if let Some(module) = &cli.module {
        file.worker.module = Some(module.display().to_string());
    }

    let mut server_config = ServerConfig::from_file(&file.server)?;
    if let Some(bind) = cli.bind {
        server_config = server_config.with_bind_addr(bind);
    }

    let state = AppState::from_config_file(&file).context("failed to prepare bridge state")?;

    info!(
        bind_addr = %server_config.bind_addr,
        module = file.worker.module.as_deref().unwrap_or("<none>"),
        "Configuration loaded"
    );

    info!("Server initialized. Available endpoints:");
    info!("  ANY  /*path                    - Worker requests");
    info!("  GET  /_bridge/health           - Health check");
    info!("  POST /_bridge/events/scheduled - Inject scheduled event");
    info!("  POST /_bridge/events/queue     - Inject queue batch");

    BridgeServer::new(state, server_config).run().await?;

    Ok(())
}
