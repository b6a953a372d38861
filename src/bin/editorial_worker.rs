//! # Editorial Worker
//!
//! Runs the editorial workflow background loops for the configured role
//! until Ctrl-C. Configuration comes from `config/editorial.toml`, the
//! environment overlay and `EDITORIAL__*` variables.

use anyhow::Context;
use editorial_workflow::config::ConfigManager;
use editorial_workflow::logging::init_structured_logging;
use editorial_workflow::orchestration::EditorialSystem;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let manager = ConfigManager::load().context("failed to load editorial configuration")?;
    info!(
        environment = %manager.environment(),
        config_directory = %manager.config_directory().display(),
        "Configuration loaded"
    );

    let system = EditorialSystem::from_config_manager(&manager)
        .await
        .context("failed to bootstrap editorial system")?;
    if let Some(database) = system.database() {
        let healthy = database
            .health_check()
            .await
            .context("database health check failed")?;
        anyhow::ensure!(healthy, "database health check returned an unexpected value");
        info!("Database health check passed");
    }
    system
        .declare_topology()
        .await
        .context("failed to declare review topology")?;

    let handle = system.start();
    info!(status = ?handle.status(), "Editorial worker running - press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    handle.stop().await;
    if let Some(database) = system.database() {
        database.clone().close().await;
    }
    Ok(())
}
