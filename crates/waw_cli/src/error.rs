//! CLI error type.

use thiserror::Error;
use waw_profile_store::StoreError;
use waw_sync_engine::SyncError;

/// Errors that end a CLI command.
#[derive(Error, Debug)]
pub enum CliError {
    /// A command needs the remote but no URL was configured.
    #[error("no sync backend configured: set CLOUD_SYNC_URL or pass --server-url")]
    MissingServerUrl,

    /// Invalid output format.
    #[error("unknown format {0:?} (expected text or json)")]
    UnknownFormat(String),

    /// The clock is outside the representable range.
    #[error("timestamp {0} is out of range")]
    ClockOutOfRange(i64),

    /// At least one sync cycle failed.
    #[error("sync failed: {0}")]
    CycleFailed(String),

    /// Profile store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Sync engine failure.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
