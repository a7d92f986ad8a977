//! Config proxy binary.
//!
//! ```text
//!   local clients                       config-proxy                          config servers
//!  ───────────────▶ POST /config/v1/get ─▶ ProxyCoordinator ─▶ subscriptions ─▶ /config/v1/subscribe
//!  ◀─────────────── cached or updated value ◀─ cache + pending set ◀──────────── long-poll answers
//!                                            ▲
//!                                            └── timeout sweeper
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use config_proxy::config::loader::load_config;
use config_proxy::config::validation::validate_config;
use config_proxy::lifecycle::{signals, startup};
use config_proxy::observability::{logging, metrics};
use config_proxy::{rpc, ProxyConfig, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "config-proxy", version, about = "Host-local configuration long-poll proxy")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(long)]
    bind: Option<String>,

    /// Upstream config source base URL (repeatable, replaces configured sources)
    #[arg(long = "source")]
    sources: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if !cli.sources.is_empty() {
        config.sources.endpoints = cli.sources;
    }
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("config error: {}", error);
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "config-proxy starting");

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

    let coordinator = startup::start(&config).await?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let router = rpc::router(coordinator.clone(), &config.listener);

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        signal_shutdown.trigger();
    });

    // Drain the core before the server waits for in-flight long-polls to finish.
    let notified = shutdown.notified();
    let drain = coordinator.clone();
    rpc::serve(listener, router, async move {
        notified.await;
        drain.shutdown().await;
    })
    .await?;

    coordinator.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
