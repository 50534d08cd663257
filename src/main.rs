//! Identity-rewriting reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                  IDENTITY PROXY                  │
//!   Client Request     │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ───────────────────┼─▶│  http   │──▶│ plugins  │──▶│   upstream   │───┼──▶ Messages API
//!                      │  │ server  │   │ registry │   │    client    │   │
//!                      │  └─────────┘   └──────────┘   └──────┬───────┘   │
//!   Client Response    │  ┌─────────┐                         │           │
//!   ◀──────────────────┼──│  relay  │◀────────────────────────┘           │
//!                      │  └─────────┘                                     │
//!                      │  config · observability · admin · lifecycle      │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use identity_proxy::config;
use identity_proxy::http::HttpServer;
use identity_proxy::lifecycle::{build_registry, wait_for_signal, Shutdown};
use identity_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "identity-proxy", version)]
#[command(about = "Reverse proxy that rewrites client identity through protocol plugins", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address (host:port)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!("{} v{} starting", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    if config.upstream.api_key.is_none() {
        tracing::warn!("No server-side API key configured; clients must send their own");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = build_registry(&config).await?;
    for plugin in registry.list() {
        tracing::info!(plugin = %plugin.name, version = %plugin.version, "Plugin loaded");
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        target = %config.upstream.base_url,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, registry.clone())?;
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server exited with error"),
        Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
    }

    if let Err(e) = registry.destroy_all().await {
        tracing::error!(error = %e, "Plugin teardown failed");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
