//! Hass-Link Watcher
//!
//! Connects to a Home Assistant hub, subscribes to an event stream, and
//! logs every event until interrupted.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hass_link::{connect, Config, LoggingConfig};

#[derive(Parser)]
#[command(name = "hass-link")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Stream real-time events from a Home Assistant hub")]
struct Cli {
    /// Hub hostname (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Hub port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Connect with TLS (wss://)
    #[arg(long)]
    tls: bool,

    /// Long-lived access token (overrides config)
    #[arg(long)]
    token: Option<String>,

    /// Event type to subscribe to, or "*" for all events
    #[arg(short, long, default_value = "state_changed")]
    event_type: String,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);

    let host = cli.host.unwrap_or(config.connection.host);
    let port = cli.port.unwrap_or(config.connection.port);
    let tls = cli.tls || config.connection.tls;
    let token = cli.token.unwrap_or(config.connection.access_token);

    tracing::info!(%host, port, "Connecting to hub");
    let conn = connect(&host, port, tls, &token).await?;

    let sub = conn
        .subscribe_events(&cli.event_type, |event| {
            tracing::info!(
                event_type = %event.event_type,
                entity_id = %event.data.entity_id,
                "Event: {:?}",
                event.data.new_state.as_ref().map(|s| &s.state)
            );
        })
        .await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Got interrupt signal, closing");

    sub.unsubscribe().await;
    conn.close().await;
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("hass_link={}", config.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
