//! Runtime settings, read from flags or the environment.

use crate::error::CliError;
use clap::{Args, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use waw_profile_store::{EncryptedProfileStore, MasterKey};
use waw_sync_engine::{HttpRemote, MissingChecksumPolicy, ReqwestClient, SyncConfig};

/// Settings shared by every command.
#[derive(Args, Clone)]
pub struct Settings {
    /// Base URL of the sync backend
    #[arg(global = true, long, env = "CLOUD_SYNC_URL")]
    pub server_url: Option<String>,

    /// Encrypted profile database
    #[arg(global = true, long, env = "PROFILE_DB_PATH", default_value = "identity.db")]
    pub profile_db: PathBuf,

    /// Sync marker file
    #[arg(global = true, long, env = "STATE_FILE", default_value = "~/.waw/state.json")]
    pub state_file: PathBuf,

    /// Local model artifact
    #[arg(
        global = true,
        long,
        env = "MODEL_PATH",
        default_value = "~/.waw/models/model.bin"
    )]
    pub model_path: PathBuf,

    /// Secret the profile database key is derived from
    #[arg(
        global = true,
        long,
        env = "WAW_MASTER_KEY",
        default_value = "dummy_key",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub master_key: String,

    /// Seconds between profile cycles
    #[arg(
        global = true,
        long,
        env = "PROFILE_INTERVAL_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub profile_interval_secs: u64,

    /// Seconds between model cycles
    #[arg(
        global = true,
        long,
        env = "MODEL_INTERVAL_SECS",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub model_interval_secs: u64,

    /// Per-request timeout in seconds
    #[arg(
        global = true,
        long,
        env = "REQUEST_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub request_timeout_secs: u64,

    /// Seconds a stop waits for in-flight cycles
    #[arg(global = true, long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 10)]
    pub shutdown_grace_secs: u64,

    /// What to do when the backend sends no model hash
    #[arg(
        global = true,
        long,
        env = "MISSING_CHECKSUM_POLICY",
        value_enum,
        default_value_t = ChecksumPolicyArg::AlwaysReplace
    )]
    pub missing_checksum: ChecksumPolicyArg,
}

/// Command-line form of [`MissingChecksumPolicy`].
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumPolicyArg {
    /// Install unverified downloads
    AlwaysReplace,
    /// Keep the current artifact
    Skip,
}

impl From<ChecksumPolicyArg> for MissingChecksumPolicy {
    fn from(arg: ChecksumPolicyArg) -> Self {
        match arg {
            ChecksumPolicyArg::AlwaysReplace => MissingChecksumPolicy::AlwaysReplace,
            ChecksumPolicyArg::Skip => MissingChecksumPolicy::Skip,
        }
    }
}

impl Settings {
    /// Marker path with `~` expanded.
    pub fn state_path(&self) -> PathBuf {
        expand_home(&self.state_file, home_dir().as_deref())
    }

    /// Model artifact path with `~` expanded.
    pub fn artifact_path(&self) -> PathBuf {
        expand_home(&self.model_path, home_dir().as_deref())
    }

    /// Profile database path with `~` expanded.
    pub fn store_path(&self) -> PathBuf {
        expand_home(&self.profile_db, home_dir().as_deref())
    }

    /// The configured backend URL.
    pub fn require_server_url(&self) -> Result<&str, CliError> {
        self.server_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(CliError::MissingServerUrl)
    }

    /// Builds the engine configuration.
    pub fn sync_config(&self) -> Result<SyncConfig, CliError> {
        Ok(SyncConfig::new(
            self.require_server_url()?,
            self.state_path(),
            self.artifact_path(),
        )
        .with_profile_interval(Duration::from_secs(self.profile_interval_secs))
        .with_model_interval(Duration::from_secs(self.model_interval_secs))
        .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
        .with_shutdown_grace(Duration::from_secs(self.shutdown_grace_secs))
        .with_missing_checksum(self.missing_checksum.into()))
    }

    /// Opens the encrypted profile store.
    pub fn open_store(&self) -> Result<EncryptedProfileStore, CliError> {
        let path = self.store_path();
        Ok(EncryptedProfileStore::open(
            &path,
            MasterKey::new(self.master_key.as_bytes()),
        )?)
    }

    /// Builds the HTTP remote for `config`.
    ///
    /// Must not be called from inside an async runtime.
    pub fn remote(config: &SyncConfig) -> Result<HttpRemote<ReqwestClient>, CliError> {
        let client = ReqwestClient::new(config.request_timeout)?;
        Ok(HttpRemote::new(config.server_url.clone(), client))
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

/// Expands a leading `~` against `home`. Other paths are returned unchanged.
pub(crate) fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        settings: Settings,
    }

    fn parse(args: &[&str]) -> Result<Settings, clap::Error> {
        let argv = std::iter::once("waw-sync").chain(args.iter().copied());
        Harness::try_parse_from(argv).map(|h| h.settings)
    }

    #[test]
    fn expand_home_prefix() {
        let home = Path::new("/home/alice");
        assert_eq!(
            expand_home(Path::new("~/.waw/state.json"), Some(home)),
            PathBuf::from("/home/alice/.waw/state.json")
        );
        assert_eq!(expand_home(Path::new("~"), Some(home)), PathBuf::from("/home/alice"));
    }

    #[test]
    fn expand_home_leaves_other_paths() {
        let home = Path::new("/home/alice");
        assert_eq!(
            expand_home(Path::new("/var/lib/state.json"), Some(home)),
            PathBuf::from("/var/lib/state.json")
        );
        assert_eq!(
            expand_home(Path::new("data/~/x"), Some(home)),
            PathBuf::from("data/~/x")
        );
        assert_eq!(
            expand_home(Path::new("~/x"), None),
            PathBuf::from("~/x")
        );
    }

    #[test]
    fn explicit_flags() {
        let settings = parse(&[
            "--server-url",
            "http://localhost:8000",
            "--state-file",
            "/tmp/state.json",
            "--model-path",
            "/tmp/model.bin",
            "--profile-interval-secs",
            "5",
            "--missing-checksum",
            "skip",
        ])
        .unwrap();

        let config = settings.sync_config().unwrap();
        assert_eq!(config.server_url, "http://localhost:8000");
        assert_eq!(config.state_path, PathBuf::from("/tmp/state.json"));
        assert_eq!(config.model_path, PathBuf::from("/tmp/model.bin"));
        assert_eq!(config.profile_interval, Duration::from_secs(5));
        assert_eq!(config.missing_checksum, MissingChecksumPolicy::Skip);
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(parse(&["--server-url", "http://x", "--model-interval-secs", "0"]).is_err());
    }

    #[test]
    fn blank_server_url_is_missing() {
        let settings = parse(&["--server-url", "  "]).unwrap();
        assert!(matches!(
            settings.sync_config(),
            Err(CliError::MissingServerUrl)
        ));
    }

    #[test]
    fn store_opens_with_master_key() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("identity.db");
        let settings = parse(&["--profile-db", db.to_str().unwrap(), "--master-key", "k1"]).unwrap();
        assert_eq!(settings.master_key, "k1");
        assert!(settings.open_store().is_ok());
    }
}
