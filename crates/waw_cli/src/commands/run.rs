//! Run command implementation.

use crate::error::CliError;
use crate::settings::Settings;
use std::sync::Arc;
use tracing::{info, warn};
use waw_sync_engine::{MarkerStore, ModelReconciler, ProfileReconciler, SyncScheduler};

/// Runs both reconcilers periodically until Ctrl-C.
pub fn run(settings: &Settings) -> Result<(), CliError> {
    let config = settings.sync_config()?;

    // Blocking HTTP clients are built and dropped outside the runtime.
    let profile = Arc::new(ProfileReconciler::new(
        settings.open_store()?,
        Settings::remote(&config)?,
        MarkerStore::new(config.state_path.clone()),
    ));
    let model = Arc::new(
        ModelReconciler::new(Settings::remote(&config)?, config.model_path.clone())
            .with_missing_checksum(config.missing_checksum),
    );

    info!(
        server = %config.server_url,
        state = %config.state_path.display(),
        model = %config.model_path.display(),
        profile_every = ?config.profile_interval,
        model_every = ?config.model_interval,
        "Starting sync"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let stats = runtime.block_on(
        SyncScheduler::from_config(Arc::clone(&profile), Arc::clone(&model), &config)
            .run_until(shutdown_signal()),
    );
    // Cycles abandoned by the scheduler must not hold up exit.
    runtime.shutdown_timeout(config.shutdown_grace);

    info!(
        profile_runs = stats.profile.runs,
        profile_failures = stats.profile.failures,
        model_runs = stats.model.runs,
        model_failures = stats.model.failures,
        "Sync stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupt received, stopping"),
        Err(e) => {
            // Without a signal handler the daemon runs until killed.
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
