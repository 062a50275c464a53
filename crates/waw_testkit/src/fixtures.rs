//! Test fixtures and filesystem helpers.
//!
//! Fixtures panic on setup failure; they are only meant for tests.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use waw_profile_store::{EncryptedProfileStore, MasterKey, ProfileSnapshot};
use waw_sync_protocol::LogicalTimestamp;

/// Master key used by [`TempWorkspace::encrypted_store`].
pub const TEST_MASTER_KEY: &str = "test-master-key";

/// A temporary directory with the standard client layout:
///
/// ```text
/// <root>/identity.db          profile store
/// <root>/state.json           sync marker
/// <root>/models/model.bin     local model artifact
/// <root>/remote/model.bin     model served by a test remote
/// ```
pub struct TempWorkspace {
    dir: TempDir,
}

impl TempWorkspace {
    /// Creates an empty workspace.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Root directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Profile store file.
    pub fn store_path(&self) -> PathBuf {
        self.path().join("identity.db")
    }

    /// Sync marker file.
    pub fn marker_path(&self) -> PathBuf {
        self.path().join("state.json")
    }

    /// Local model artifact.
    pub fn artifact_path(&self) -> PathBuf {
        self.path().join("models").join("model.bin")
    }

    /// Model file for a test remote.
    pub fn remote_model_path(&self) -> PathBuf {
        self.path().join("remote").join("model.bin")
    }

    /// Opens an encrypted profile store at [`store_path`](Self::store_path).
    pub fn encrypted_store(&self) -> EncryptedProfileStore {
        EncryptedProfileStore::open(&self.store_path(), MasterKey::new(TEST_MASTER_KEY))
            .expect("Failed to open profile store")
    }

    /// Writes the local artifact, creating its directory.
    pub fn write_artifact(&self, bytes: &[u8]) {
        let path = self.artifact_path();
        fs::create_dir_all(path.parent().expect("artifact has a parent"))
            .expect("Failed to create model directory");
        fs::write(path, bytes).expect("Failed to write artifact");
    }

    /// Reads the local artifact, or `None` if absent.
    pub fn read_artifact(&self) -> Option<Vec<u8>> {
        fs::read(self.artifact_path()).ok()
    }

    /// Writes a marker file the way an earlier client would have.
    pub fn write_marker(&self, secs: i64) {
        let body = serde_json::json!({ "last_synced_at": secs }).to_string();
        fs::write(self.marker_path(), body).expect("Failed to write marker");
    }

    /// Reads the raw marker value, or `None` if absent.
    pub fn read_marker(&self) -> Option<i64> {
        let data = fs::read(self.marker_path()).ok()?;
        let value: serde_json::Value = serde_json::from_slice(&data).expect("Malformed marker");
        value["last_synced_at"].as_i64()
    }

    /// Lists file names left next to the artifact (e.g., staging files).
    pub fn artifact_dir_entries(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.path().join("models")) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// ISO-8601 UTC text for `secs`, as the CLI writes it.
pub fn iso(secs: i64) -> String {
    LogicalTimestamp::from_secs(secs)
        .to_iso8601()
        .expect("timestamp in range")
}

/// A profile created at the epoch and last edited at `updated_secs`.
pub fn sample_profile(id: &str, updated_secs: i64) -> ProfileSnapshot {
    ProfileSnapshot::new(id, iso(0))
        .with_name("Test User")
        .with_email("test@example.com")
        .with_phone("+15550100")
        .with_updated_at(iso(updated_secs))
}
