//! Model artifact served to clients.

use crate::error::ServerResult;
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use waw_sync_protocol::ContentHash;

/// The model file behind `GET /model/latest`.
///
/// The file is re-read and re-hashed on every request, so replacing it on
/// disk is enough to publish a new model.
#[derive(Debug)]
pub struct ModelRepository {
    path: PathBuf,
    pinned_hash: RwLock<Option<ContentHash>>,
}

impl ModelRepository {
    /// Creates a repository serving the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pinned_hash: RwLock::new(None),
        }
    }

    /// Returns the model file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the model bytes and the hash to advertise, or `None` if no
    /// model has been published.
    pub fn latest(&self) -> ServerResult<Option<(Vec<u8>, ContentHash)>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let hash = match self.pinned_hash.read().clone() {
            Some(pinned) => pinned,
            None => ContentHash::of_bytes(&bytes),
        };
        Ok(Some((bytes, hash)))
    }

    /// Replaces the model file atomically and returns its hash.
    pub fn publish(&self, bytes: &[u8]) -> ServerResult<ContentHash> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut temp_name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        temp_name.push(".tmp");
        let temp_path = self.path.with_file_name(temp_name);

        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, &self.path)?;

        let hash = ContentHash::of_bytes(bytes);
        debug!(sha256 = %hash, bytes = bytes.len(), "model published");
        Ok(hash)
    }

    /// Removes the model file. Returns false if there was none.
    pub fn withdraw(&self) -> ServerResult<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Advertises `hash` instead of the real one until cleared with `None`.
    ///
    /// Lets client tests exercise the verification path against a remote
    /// whose header disagrees with its body.
    pub fn pin_hash(&self, hash: Option<ContentHash>) {
        *self.pinned_hash.write() = hash;
    }
}
