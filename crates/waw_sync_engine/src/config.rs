//! Configuration for the sync engine.

use std::path::PathBuf;
use std::time::Duration;

/// What the model reconciler does when the remote sends no hash header.
///
/// Without a hash, freshness cannot be determined and downloaded bytes
/// cannot be verified. Which way to fail is a deployment decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingChecksumPolicy {
    /// Download and replace the artifact without verification.
    #[default]
    AlwaysReplace,
    /// Leave the artifact alone and report the cycle as unverifiable.
    Skip,
}

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the remote service (e.g., "https://sync.example.com").
    pub server_url: String,
    /// Path of the persisted sync marker file.
    pub state_path: PathBuf,
    /// Path of the committed model artifact.
    pub model_path: PathBuf,
    /// Period of the profile reconciler.
    pub profile_interval: Duration,
    /// Period of the model reconciler.
    pub model_interval: Duration,
    /// Bound on each remote request, including reading the body.
    pub request_timeout: Duration,
    /// How long a stop waits for in-flight cycles before cancelling them.
    pub shutdown_grace: Duration,
    /// Behavior when the remote omits the model hash.
    pub missing_checksum: MissingChecksumPolicy,
}

impl SyncConfig {
    /// Creates a configuration with default intervals and timeouts.
    pub fn new(
        server_url: impl Into<String>,
        state_path: impl Into<PathBuf>,
        model_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            state_path: state_path.into(),
            model_path: model_path.into(),
            profile_interval: Duration::from_secs(60),
            model_interval: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(10),
            missing_checksum: MissingChecksumPolicy::default(),
        }
    }

    /// Sets the profile reconciler period.
    pub fn with_profile_interval(mut self, interval: Duration) -> Self {
        self.profile_interval = interval;
        self
    }

    /// Sets the model reconciler period.
    pub fn with_model_interval(mut self, interval: Duration) -> Self {
        self.model_interval = interval;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Sets the missing-hash policy.
    pub fn with_missing_checksum(mut self, policy: MissingChecksumPolicy) -> Self {
        self.missing_checksum = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_defaults() {
        let config = SyncConfig::new("https://sync.example.com", "state.json", "model.bin");
        assert_eq!(config.profile_interval, Duration::from_secs(60));
        assert_eq!(config.model_interval, Duration::from_secs(300));
        assert!(config.profile_interval < config.model_interval);
        assert_eq!(config.missing_checksum, MissingChecksumPolicy::AlwaysReplace);
    }

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("https://sync.example.com", "state.json", "model.bin")
            .with_profile_interval(Duration::from_secs(5))
            .with_model_interval(Duration::from_secs(50))
            .with_request_timeout(Duration::from_secs(3))
            .with_shutdown_grace(Duration::from_secs(1))
            .with_missing_checksum(MissingChecksumPolicy::Skip);

        assert_eq!(config.server_url, "https://sync.example.com");
        assert_eq!(config.state_path, PathBuf::from("state.json"));
        assert_eq!(config.profile_interval, Duration::from_secs(5));
        assert_eq!(config.model_interval, Duration::from_secs(50));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.shutdown_grace, Duration::from_secs(1));
        assert_eq!(config.missing_checksum, MissingChecksumPolicy::Skip);
    }
}
