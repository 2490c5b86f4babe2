//! bedrock-relay
//!
//! Relays chat between a Minecraft Bedrock session and a Discord channel.
//! The bridge is started and stopped over a small HTTP control surface.

mod config;
mod factory;

use anyhow::{Context, Result};
use clap::Parser;
use config::{CliArgs, RelayConfig};
use factory::RelayFactory;
use relay_server::{BridgeController, StopOutcome, control};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();
    let config = RelayConfig::load(&cli).context("failed to load configuration")?;

    // Initialize logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        "bedrock-relay starting (game: {} as {}, channel: {})",
        config.game.address(),
        config.game.username,
        config.chat.channel_id
    );

    let controller = BridgeController::new(
        Arc::new(RelayFactory::new(config.game.clone(), config.chat.clone())),
        config.transformer(),
        config.bridge_options(),
    );

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind control surface to {}", config.bind_addr))?;
    let app = control::router(controller.clone(), config.start_timeout);

    control::serve(listener, app, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
    })
    .await?;

    if controller.stop().await == StopOutcome::Stopped {
        info!("Bridge stopped");
    }
    info!("bedrock-relay exited");
    Ok(())
}
