//! Persisted sync marker.
//!
//! The marker file holds the `updated_at` of the last profile revision the
//! remote acknowledged:
//!
//! ```text
//! {"last_synced_at": 1746774553}
//! ```
//!
//! An absent file means the profile has never been synced.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;
use waw_sync_protocol::LogicalTimestamp;

/// The last logical timestamp confirmed by the remote.
pub type SyncMarker = LogicalTimestamp;

#[derive(Debug, Serialize, Deserialize)]
struct MarkerFile {
    #[serde(default)]
    last_synced_at: Option<i64>,
}

/// Durable storage for the [`SyncMarker`].
///
/// Writes use write-temp, sync, rename, sync-directory, so a reader sees
/// either the previous marker or the new one and never a torn file. Each
/// write gets its own temp file, so writers in other processes cannot
/// interleave into it. [`advance`](Self::advance) never lowers the stored
/// value.
#[derive(Debug)]
pub struct MarkerStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl MarkerStore {
    /// Creates a marker store at `path`. Nothing is touched until a write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the marker file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the marker.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::LocalState`] if the file exists but cannot be
    /// read or parsed.
    pub fn load(&self) -> SyncResult<Option<SyncMarker>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SyncError::LocalState(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )))
            }
        };

        let file: MarkerFile = serde_json::from_slice(&data).map_err(|e| {
            SyncError::LocalState(format!("malformed marker {}: {e}", self.path.display()))
        })?;
        Ok(file.last_synced_at.map(SyncMarker::from_secs))
    }

    /// Reads the marker, treating an unreadable file as "never synced".
    ///
    /// The failure is logged; the caller proceeds as if no marker existed,
    /// which at worst causes one redundant, idempotent push.
    pub fn load_or_absent(&self) -> Option<SyncMarker> {
        match self.load() {
            Ok(marker) => marker,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable sync marker");
                None
            }
        }
    }

    /// Unconditionally writes `marker`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Persistence`] on any I/O failure.
    pub fn store(&self, marker: SyncMarker) -> SyncResult<()> {
        let _guard = self.write_lock.lock();
        self.write_unlocked(marker)
    }

    /// Writes `marker` only if it is newer than the stored value.
    ///
    /// Returns whether the file was written. An unreadable existing marker
    /// is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Persistence`] on any I/O failure.
    pub fn advance(&self, marker: SyncMarker) -> SyncResult<bool> {
        let _guard = self.write_lock.lock();
        if let Some(current) = self.load_or_absent() {
            if marker <= current {
                return Ok(false);
            }
        }
        self.write_unlocked(marker)?;
        Ok(true)
    }

    fn write_unlocked(&self, marker: SyncMarker) -> SyncResult<()> {
        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent)?;
        }

        let body = serde_json::to_vec(&MarkerFile {
            last_synced_at: Some(marker.as_secs()),
        })
        .map_err(io::Error::from)?;

        let mut temp = sibling_temp(&self.path, ".tmp")?;
        temp.write_all(&body)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        sync_directory(parent)?;
        Ok(())
    }
}

/// Creates a uniquely named temp file next to `path`.
///
/// The name is `.<file name>.<random><suffix>`; being in the same directory
/// keeps the final rename on one filesystem. The file is removed on drop
/// unless persisted.
pub(crate) fn sibling_temp(path: &Path, suffix: &str) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut prefix = OsString::from(".");
    if let Some(name) = path.file_name() {
        prefix.push(name);
    }
    prefix.push(".");

    tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(suffix)
        .tempfile_in(dir)
}

/// Syncs a directory so a rename inside it is durable.
#[cfg(unix)]
pub(crate) fn sync_directory(dir: Option<&Path>) -> io::Result<()> {
    if let Some(dir) = dir {
        File::open(dir)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn sync_directory(_dir: Option<&Path>) -> io::Result<()> {
    // NTFS journals metadata; directory handles cannot be fsynced
    Ok(())
}
