//! Atrium sync server entry point.
//!
//! Parses the command line, loads the TOML configuration, initializes
//! logging, and runs the sync server until ctrl-c.

use std::sync::Arc;
use tracing::{error, info};

mod cli;
mod config;
mod logging;

use cli::CliArgs;
use config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let mut config = AppConfig::load_from_file(&args.config_path).await?;

    // Apply CLI overrides
    if let Some(bind_address) = args.bind_address {
        config.server.bind_address = bind_address;
    }
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    config.validate()?;

    logging::setup_logging(&config.logging, args.json_logs)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;
    logging::display_banner();
    info!("📂 Config: {}", args.config_path.display());

    let server_config = config.to_server_config()?;
    let server = Arc::new(atrium_server::create_server_with_config(server_config));

    // Ctrl-c initiates graceful shutdown; the accept loop and periodic
    // cycles all stop on the shutdown signal.
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Ctrl-C received, shutting down");
            if let Err(e) = shutdown_server.shutdown().await {
                error!("Shutdown signal failed: {}", e);
            }
        }
    });

    server.start().await?;

    let stats = server.stats().await;
    info!(
        "📊 Final stats: {} samples in, {} snapshots out ({} frames, {} bytes), {} skipped, {} reaped",
        stats.samples_received,
        stats.snapshots_sent,
        stats.frames_sent,
        stats.bytes_sent,
        stats.broadcasts_skipped,
        stats.entities_reaped,
    );
    Ok(())
}
