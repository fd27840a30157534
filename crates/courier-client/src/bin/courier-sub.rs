//! Demo subscriber: prints every message routed to its channels until
//! interrupted.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use courier_client::Subscriber;
use courier_transport::TransportKind;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "courier-sub", about = "Courier demo subscriber", version)]
struct Args {
    /// Broker host address
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Broker port
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Channels to subscribe to (comma separated)
    #[arg(short, long, value_delimiter = ',', required = true)]
    channels: Vec<u8>,

    /// Client identifier
    #[arg(long, default_value = "subscriber")]
    client_id: String,

    /// Transport to use
    #[arg(short, long, default_value = "tcp")]
    transport: TransportKind,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("invalid broker address")?;

    let mut subscriber =
        Subscriber::connect(args.transport, addr, args.channels.clone(), &args.client_id)
            .await?;

    info!(broker = %addr, channels = ?args.channels, "listening; press ctrl-c to exit");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut received = 0u64;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,

            delivery = subscriber.next_message() => {
                match delivery {
                    Ok(Some(delivery)) => {
                        info!(
                            channel = delivery.channel,
                            timestamp_ms = delivery.timestamp_ms,
                            message = %String::from_utf8_lossy(&delivery.payload),
                            "message"
                        );
                        received += 1;
                    }
                    Ok(None) => {
                        info!("broker closed the connection");
                        return Ok(());
                    }
                    Err(err) => {
                        warn!(error = %err, "receive failed");
                        return Err(err.into());
                    }
                }
            }
        }
    }

    if let Err(err) = subscriber.disconnect().await {
        warn!(error = %err, "disconnect failed");
    }
    info!(received, "subscriber stopped");

    Ok(())
}
