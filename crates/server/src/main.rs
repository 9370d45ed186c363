//! Redpin Server - Main Entry Point

use server::{bootstrap, init_logging, storage_report, ServerConfig};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ServerConfig::load(config_path.as_deref())?;
    init_logging(&config.logging)?;

    info!("=== Redpin Server v{} ===", env!("CARGO_PKG_VERSION"));

    let factory = bootstrap(&config.storage).await?;
    for (identifier, count) in storage_report(&factory).await? {
        info!("{}: {} records", identifier, count);
    }

    // Homes live as long as the process
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}
