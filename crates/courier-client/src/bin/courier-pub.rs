//! Demo publisher: pushes generated match events to a broker channel
//! at a configured pace until interrupted.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use courier_client::{FeedGenerator, Publisher};
use courier_transport::TransportKind;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "courier-pub", about = "Courier demo publisher", version)]
struct Args {
    /// Broker host address
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Broker port
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Message generator seed (0 = random)
    #[arg(short, long, default_value_t = 0)]
    seed: u32,

    /// Delay between messages in milliseconds
    #[arg(short, long, default_value_t = 500)]
    delay: u64,

    /// Channel to publish on
    #[arg(short, long, default_value_t = 0)]
    channel: u8,

    /// Client identifier
    #[arg(long, default_value = "publisher")]
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

    let mut publisher =
        Publisher::connect(args.transport, addr, args.channel, &args.client_id).await?;
    let mut feed = FeedGenerator::new((args.seed != 0).then_some(u64::from(args.seed)));

    info!(
        broker = %addr,
        channel = args.channel,
        delay_ms = args.delay,
        "publishing; press ctrl-c to exit"
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(args.delay.max(1)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut published = 0u64;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,

            _ = ticker.tick() => {
                let event = feed.next_event();
                info!(message = %event, "publish");
                if let Err(err) = publisher.publish(event.into_bytes()).await {
                    warn!(error = %err, "publish failed, stopping");
                    break;
                }
                published += 1;
            }
        }
    }

    if let Err(err) = publisher.disconnect().await {
        warn!(error = %err, "disconnect failed");
    }
    info!(published, "publisher stopped");

    Ok(())
}
