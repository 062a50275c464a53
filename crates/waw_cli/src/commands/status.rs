//! Status command implementation.

use crate::error::CliError;
use crate::settings::Settings;
use serde::Serialize;
use std::path::Path;
use waw_profile_store::ProfileStore;
use waw_sync_engine::{checksum, MarkerStore};
use waw_sync_protocol::LogicalTimestamp;

/// Local sync state.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Sync marker in seconds since the epoch.
    pub last_synced_at: Option<i64>,
    /// Model artifact path.
    pub model_path: String,
    /// SHA-256 of the model artifact, if present.
    pub model_sha256: Option<String>,
    /// Local profile summary.
    pub profile: Option<ProfileStatus>,
}

/// Summary of the local profile.
#[derive(Debug, Serialize)]
pub struct ProfileStatus {
    /// User ID.
    pub id: String,
    /// Stored `updated_at` text.
    pub updated_at: String,
    /// Whether the next profile cycle would push.
    pub pending: bool,
}

/// Prints the marker, artifact hash and local profile.
pub fn run(settings: &Settings, format: &str) -> Result<(), CliError> {
    let store = settings.open_store()?;
    let report = collect(
        &MarkerStore::new(settings.state_path()),
        &settings.artifact_path(),
        &store,
    )?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print!("{}", render_text(&report)),
        other => return Err(CliError::UnknownFormat(other.to_string())),
    }
    Ok(())
}

/// Gathers the status report.
pub fn collect(
    marker: &MarkerStore,
    artifact: &Path,
    store: &impl ProfileStore,
) -> Result<StatusReport, CliError> {
    let last_synced = marker.load_or_absent();
    let model_sha256 = checksum::sha256_file(artifact)?.map(|h| h.as_str().to_string());

    let profile = store.get_profile()?.map(|p| {
        let updated = p.updated_at_logical().unwrap_or(LogicalTimestamp::ZERO);
        ProfileStatus {
            pending: last_synced != Some(updated),
            id: p.id,
            updated_at: p.updated_at,
        }
    });

    Ok(StatusReport {
        last_synced_at: last_synced.map(LogicalTimestamp::as_secs),
        model_path: artifact.display().to_string(),
        model_sha256,
        profile,
    })
}

fn render_text(report: &StatusReport) -> String {
    let mut out = String::new();
    out.push_str("=== Sync Status ===\n");
    match report.last_synced_at {
        Some(secs) => {
            let iso = LogicalTimestamp::from_secs(secs)
                .to_iso8601()
                .unwrap_or_else(|| secs.to_string());
            out.push_str(&format!("Last synced:  {iso} ({secs})\n"));
        }
        None => out.push_str("Last synced:  never\n"),
    }

    out.push_str(&format!("Model:        {}\n", report.model_path));
    out.push_str(&format!(
        "Model SHA256: {}\n",
        report.model_sha256.as_deref().unwrap_or("(missing)")
    ));

    match &report.profile {
        Some(p) => {
            out.push_str(&format!("Profile:      {} (updated {})\n", p.id, p.updated_at));
            out.push_str(&format!(
                "Pending push: {}\n",
                if p.pending { "yes" } else { "no" }
            ));
        }
        None => out.push_str("Profile:      (none)\n"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use waw_profile_store::MemoryProfileStore;
    use waw_sync_protocol::ContentHash;
    use waw_testkit::{sample_profile, TempWorkspace};

    #[test]
    fn empty_workspace() {
        let ws = TempWorkspace::new();
        let report = collect(
            &MarkerStore::new(ws.marker_path()),
            &ws.artifact_path(),
            &MemoryProfileStore::new(),
        )
        .unwrap();

        assert_eq!(report.last_synced_at, None);
        assert_eq!(report.model_sha256, None);
        assert!(report.profile.is_none());
        assert!(render_text(&report).contains("never"));
    }

    #[test]
    fn synced_profile_is_not_pending() {
        let ws = TempWorkspace::new();
        ws.write_marker(1000);
        ws.write_artifact(b"weights");
        let store = MemoryProfileStore::with_profile(sample_profile("user-1", 1000));

        let report = collect(&MarkerStore::new(ws.marker_path()), &ws.artifact_path(), &store)
            .unwrap();

        assert_eq!(report.last_synced_at, Some(1000));
        assert_eq!(
            report.model_sha256.as_deref(),
            Some(ContentHash::of_bytes(b"weights").as_str())
        );
        let profile = report.profile.unwrap();
        assert_eq!(profile.id, "user-1");
        assert!(!profile.pending);
    }

    #[test]
    fn edited_profile_is_pending() {
        let ws = TempWorkspace::new();
        ws.write_marker(1000);
        let store = MemoryProfileStore::with_profile(sample_profile("user-1", 2000));

        let report = collect(&MarkerStore::new(ws.marker_path()), &ws.artifact_path(), &store)
            .unwrap();
        assert!(report.profile.unwrap().pending);

        let json = serde_json::to_value(
            collect(&MarkerStore::new(ws.marker_path()), &ws.artifact_path(), &store).unwrap(),
        )
        .unwrap();
        assert_eq!(json["last_synced_at"], 1000);
        assert_eq!(json["profile"]["pending"], true);
    }
}
