//! GazeSync Relay — standalone broadcast hub

use clap::Parser;
use gazesync_relay::{Relay, RelayConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "gazesync-relay",
    about = "Gaze session relay — broadcast hub for subject and observer clients"
)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "9400")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gazesync_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let relay = Relay::bind(&RelayConfig {
        bind: cli.bind,
        port: cli.port,
    })
    .await?;
    relay.serve().await
}
