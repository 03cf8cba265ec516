//! Weighted round-robin reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request      ┌──────────┐    ┌───────────────┐    ┌───────────┐
//!     ───────────────────▶│  axum    │───▶│ load_balancer │───▶│ forwarder │───▶ Backend
//!                         │  server  │    │  pool + SWRR  │    │  (hyper)  │
//!                         └──────────┘    └───────▲───────┘    └───────────┘
//!                                                 │
//!                         ┌──────────┐            │
//!     Admin API ─────────▶│  admin   │────────────┤ upsert / remove / weights
//!                         └──────────┘            │
//!                         ┌──────────┐            │
//!     Config file ───────▶│ watcher  │────────────┘ reconcile
//!                         └──────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use roundrobin_proxy::config::{load_config, ConfigWatcher, ProxyConfig};
use roundrobin_proxy::lifecycle::signals::shutdown_on_signal;
use roundrobin_proxy::observability::init_logging;
use roundrobin_proxy::{controller, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "roundrobin-proxy")]
#[command(about = "Weighted round-robin reverse proxy", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the backend pool when the configuration file changes.
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "roundrobin-proxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        default_weight = config.balancer.default_weight,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let admin_listener = if config.admin.enabled {
        Some(TcpListener::bind(&config.admin.bind_address).await?)
    } else {
        None
    };

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(config)?;

    // Kept alive for the lifetime of the server.
    let _watcher = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            tokio::spawn(controller::run(
                server.load_balancer().clone(),
                updates,
                shutdown.subscribe(),
            ));
            Some(watcher)
        }
        _ => None,
    };

    server.run(listener, admin_listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
