use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bmsbridge::{BleTransport, Config, MqttSink, Poller};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "bmsbridge.toml".into());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load configuration from {config_path}"))?;

    info!("Starting bmsbridge version {}...", env!("CARGO_PKG_VERSION"));
    info!(
        batteries = config.devices.len(),
        broker = %format!("{}:{}", config.mqtt.host, config.mqtt.port),
        "configuration loaded"
    );

    let sink = Arc::new(MqttSink::start(&config.mqtt));
    let transport = Arc::new(
        BleTransport::new()
            .await
            .context("Bluetooth adapter unavailable")?,
    );
    let poller = Poller::new(transport, sink, &config)?;

    tokio::select! {
        _ = poller.run() => {
            error!("poll loop unexpectedly finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
