//! # Courier broker
//!
//! Lightweight pub/sub broker with a compact binary wire protocol.
//!
//! ## Usage
//!
//! ```bash
//! # TCP broker on the default port
//! courier-broker
//!
//! # UDP broker with verbose logging
//! courier-broker --transport udp -v
//!
//! # Custom bind address
//! courier-broker --host 0.0.0.0 -p 6000
//! ```

use anyhow::Result;
use clap::Parser;
use courier_broker::{metrics, Config, DatagramBroker, StreamBroker};
use courier_transport::TransportKind;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "courier-broker", about = "Courier pub/sub broker", version)]
struct Args {
    /// Listen host address
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Transport to serve
    #[arg(short, long, default_value = "tcp")]
    transport: TransportKind,

    /// Enable diagnostic logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the metrics exporter port
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "courier_broker=debug,courier_core=debug,courier_transport=debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(port) = args.metrics_port {
        config.metrics.port = port;
    }

    metrics::init_metrics();
    if config.metrics.enabled {
        if let Err(err) = metrics::start_metrics_server(config.metrics.port) {
            tracing::error!("failed to start metrics exporter: {err}");
        }
    }

    let addr = config.bind_addr()?;

    match args.transport {
        TransportKind::Tcp => {
            let broker = StreamBroker::bind(addr).await?;
            tracing::info!("broker listening on tcp://{}", broker.local_addr()?);
            broker.run(shutdown_signal()).await?;
        }
        TransportKind::Udp => {
            let broker = DatagramBroker::bind(addr).await?;
            tracing::info!("broker listening on udp://{}", broker.local_addr()?);
            broker.run(shutdown_signal()).await?;
        }
    }

    Ok(())
}

/// Resolves when the process receives SIGINT.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
    }
}
