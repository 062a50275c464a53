//! Once command implementation.

use crate::error::CliError;
use crate::settings::Settings;
use waw_sync_engine::{MarkerStore, ModelReconciler, ProfileReconciler};

/// Runs one profile cycle and one model cycle.
///
/// Both cycles always run; the command fails if either did.
pub fn run(settings: &Settings) -> Result<(), CliError> {
    let config = settings.sync_config()?;

    let profile = ProfileReconciler::new(
        settings.open_store()?,
        Settings::remote(&config)?,
        MarkerStore::new(config.state_path.clone()),
    );
    let model = ModelReconciler::new(Settings::remote(&config)?, config.model_path.clone())
        .with_missing_checksum(config.missing_checksum);

    let profile_outcome = profile.reconcile();
    println!("profile: {profile_outcome}");
    let model_outcome = model.reconcile();
    println!("model:   {model_outcome}");

    let failures: Vec<String> = [
        profile_outcome
            .is_failure()
            .then(|| format!("profile: {profile_outcome}")),
        model_outcome
            .is_failure()
            .then(|| format!("model: {model_outcome}")),
    ]
    .into_iter()
    .flatten()
    .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(CliError::CycleFailed(failures.join("; ")))
    }
}
