//! Profile command implementations.

use crate::error::CliError;
use crate::settings::Settings;
use tracing::info;
use uuid::Uuid;
use waw_profile_store::{ProfileSnapshot, ProfileStore};
use waw_sync_engine::RemoteProfileClient;
use waw_sync_protocol::LogicalTimestamp;

/// Fields given to `profile set`.
#[derive(Debug, Clone, Default)]
pub struct ProfileEdit {
    /// User ID; kept or generated when absent.
    pub id: Option<String>,
    /// Full name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Phone number; kept when absent.
    pub phone: Option<String>,
}

/// Prints the local profile as JSON.
pub fn show(settings: &Settings) -> Result<(), CliError> {
    match settings.open_store()?.get_profile()? {
        Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
        None => println!("No profile stored."),
    }
    Ok(())
}

/// Creates or updates the local profile.
pub fn set(settings: &Settings, edit: ProfileEdit) -> Result<(), CliError> {
    let store = settings.open_store()?;
    let stored = apply_edit(&store, edit, LogicalTimestamp::now())?;
    info!(id = %stored.id, updated_at = %stored.updated_at, "Profile saved");
    println!("Profile saved: {} (updated {})", stored.id, stored.updated_at);
    Ok(())
}

/// Deletes the local profile, and the remote copy when `remote` is set.
///
/// The remote delete runs first so a failure leaves the local profile in
/// place for a retry.
pub fn delete(settings: &Settings, remote: bool) -> Result<(), CliError> {
    let store = settings.open_store()?;
    let Some(profile) = store.get_profile()? else {
        println!("No profile stored.");
        return Ok(());
    };

    if remote {
        let config = settings.sync_config()?;
        let client = Settings::remote(&config)?;
        if client.delete_profile(&profile.id)? {
            println!("Deleted remote profile {}", profile.id);
        } else {
            println!("Remote had no profile {}", profile.id);
        }
    }

    store.delete_profile(&profile.id)?;
    info!(id = %profile.id, "Profile deleted");
    println!("Deleted local profile {}", profile.id);
    Ok(())
}

/// Builds the edited profile from `existing` and stores it.
///
/// The id comes from the edit, then the stored profile, then a fresh UUID.
/// `updated_at` is `now`, bumped past the stored value so that the next
/// profile cycle sees a change even for edits within the same second.
pub fn apply_edit(
    store: &impl ProfileStore,
    edit: ProfileEdit,
    now: LogicalTimestamp,
) -> Result<ProfileSnapshot, CliError> {
    let existing = store.get_profile()?;

    let id = edit
        .id
        .or_else(|| existing.as_ref().map(|p| p.id.clone()))
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let previous = existing
        .as_ref()
        .filter(|p| p.id == id)
        .and_then(|p| p.updated_at_logical().ok());
    let updated = match previous {
        Some(prev) if prev >= now => LogicalTimestamp::from_secs(prev.as_secs() + 1),
        _ => now,
    };
    let updated_at = updated
        .to_iso8601()
        .ok_or(CliError::ClockOutOfRange(updated.as_secs()))?;

    let phone = edit.phone.or_else(|| {
        existing
            .as_ref()
            .filter(|p| p.id == id)
            .and_then(|p| p.phone.clone())
    });

    // created_at is carried over by the store when the id matches.
    let mut profile = ProfileSnapshot::new(id, updated_at)
        .with_name(edit.name)
        .with_email(edit.email);
    if let Some(phone) = phone {
        profile = profile.with_phone(phone);
    }

    Ok(store.put_profile(profile)?)
}
