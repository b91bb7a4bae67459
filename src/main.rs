//! Route proxy
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ dispatcher ──▶ routing (prefix match)
//!                                         │
//!                                         ▼
//!                                     security (credential gate, header rules)
//!                                         │
//!                                         ▼
//!     Client Response                 forwarder ──────────────────▶ Upstream
//!     ◀────────────── response ◀──────────────────────────────────
//!
//!     Cross-cutting: config (load, validate, watch), observability,
//!                    resilience (deadlines), lifecycle (shutdown)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use route_proxy::config::{load_config, ConfigWatcher};
use route_proxy::lifecycle::{wait_for_signal, Shutdown};
use route_proxy::observability::{logging, metrics};
use route_proxy::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "route-proxy", version, about = "Prefix-routed reverse proxy")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "proxy.toml")]
    config: PathBuf,

    /// Do not reload routes when the configuration file changes
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("route-proxy: {}: {e}", args.config.display());
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "route-proxy starting");

    match run(args, config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    args: Args,
    config: route_proxy::ProxyConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        mount_path = %config.mount_path,
        endpoints = config.endpoints.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = if args.no_watch {
        let (_tx, rx) = mpsc::unbounded_channel();
        (None, rx)
    } else {
        let (watcher, rx) = ConfigWatcher::new(&args.config);
        (Some(watcher.run()?), rx)
    };

    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, config_updates, server_shutdown).await?;
    Ok(())
}
