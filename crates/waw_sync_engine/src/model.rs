//! Verified, atomic model download.

use crate::checksum::{self, CHUNK_SIZE};
use crate::config::MissingChecksumPolicy;
use crate::error::SyncError;
use crate::marker::{sibling_temp, sync_directory};
use crate::transport::RemoteModelClient;
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use waw_sync_protocol::ContentHash;

/// Result of one model reconciliation cycle.
#[derive(Debug)]
pub enum ModelOutcome {
    /// The local artifact already matches the remote. Nothing was written.
    UpToDate,
    /// The artifact was replaced.
    Updated {
        /// Hash of the new artifact.
        sha256: ContentHash,
        /// False when the remote sent no hash to check against.
        verified: bool,
    },
    /// Downloaded bytes did not match the advertised hash and were
    /// discarded.
    VerificationFailed {
        /// Hash advertised by the remote.
        expected: ContentHash,
        /// Hash of the downloaded bytes.
        actual: ContentHash,
    },
    /// The remote sent no hash and the policy says not to trust the body.
    UnverifiableSkipped,
    /// The request or the body transfer failed. No local state changed.
    FetchFailed(SyncError),
    /// A local filesystem operation failed.
    Failed(SyncError),
}

impl ModelOutcome {
    /// Returns true for outcomes that should count as a failed cycle.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ModelOutcome::VerificationFailed { .. }
                | ModelOutcome::FetchFailed(_)
                | ModelOutcome::Failed(_)
        )
    }

    /// Returns the mismatch as an [`SyncError::Integrity`], if any.
    pub fn integrity_error(&self) -> Option<SyncError> {
        match self {
            ModelOutcome::VerificationFailed { expected, actual } => Some(SyncError::Integrity {
                expected: expected.to_string(),
                actual: actual.to_string(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for ModelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelOutcome::UpToDate => write!(f, "up to date"),
            ModelOutcome::Updated {
                sha256,
                verified: true,
            } => write!(f, "updated to {sha256}"),
            ModelOutcome::Updated { sha256, .. } => write!(f, "updated to {sha256} (unverified)"),
            ModelOutcome::VerificationFailed { expected, actual } => {
                write!(f, "verification failed: expected {expected}, got {actual}")
            }
            ModelOutcome::UnverifiableSkipped => write!(f, "skipped: remote sent no hash"),
            ModelOutcome::FetchFailed(e) => write!(f, "fetch failed: {e}"),
            ModelOutcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

const STAGING_SUFFIX: &str = ".partial";

enum StageError {
    /// The body stream broke off or the cycle was cancelled.
    Stream(SyncError),
    /// Writing the staging file failed.
    Local(io::Error),
}

/// Keeps a local model artifact identical to the remote's latest model.
///
/// # Protocol
///
/// 1. Request the latest model; the hash header arrives before the body.
/// 2. If the local artifact already has the advertised hash, stop.
/// 3. Stream the body into a fresh `.<artifact>.<random>.partial` file next
///    to the artifact, sync it, hash it from disk.
/// 4. Rename it over the artifact only if the hash matches.
///
/// The committed artifact is therefore either the old file or a complete,
/// verified new one. Every cycle stages into its own file, so reconcilers
/// running concurrently on one artifact, in this process or another, only
/// ever commit whole downloads.
#[derive(Debug)]
pub struct ModelReconciler<C> {
    client: C,
    artifact_path: PathBuf,
    policy: MissingChecksumPolicy,
    cancelled: AtomicBool,
}

impl<C: RemoteModelClient> ModelReconciler<C> {
    /// Creates a reconciler for the artifact at `artifact_path`.
    pub fn new(client: C, artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            client,
            artifact_path: artifact_path.into(),
            policy: MissingChecksumPolicy::default(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Sets the behavior for responses without a hash header.
    pub fn with_missing_checksum(mut self, policy: MissingChecksumPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the committed artifact path.
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Returns the remote client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Aborts the current download at its next chunk.
    ///
    /// Stays in effect until [`reset_cancel`](Self::reset_cancel).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clears a previous [`cancel`](Self::cancel).
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Returns true if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Runs one cycle. Never panics on I/O or remote errors.
    pub fn reconcile(&self) -> ModelOutcome {
        if self.is_cancelled() {
            return ModelOutcome::FetchFailed(SyncError::Cancelled);
        }

        let download = match self.client.fetch_latest() {
            Ok(download) => download,
            Err(e) => return ModelOutcome::FetchFailed(e),
        };

        let local = match checksum::sha256_file(&self.artifact_path) {
            Ok(hash) => hash,
            Err(e) => return ModelOutcome::Failed(e.into()),
        };

        let expected = download.descriptor.sha256;
        match &expected {
            Some(remote) if local.as_ref() == Some(remote) => {
                debug!(sha256 = %remote, "model up to date");
                return ModelOutcome::UpToDate;
            }
            None if self.policy == MissingChecksumPolicy::Skip => {
                warn!("remote sent no model hash, skipping download");
                return ModelOutcome::UnverifiableSkipped;
            }
            _ => {}
        }

        // Staging files are removed on drop unless committed.
        let (staging, staged) = match self.stage(download.body) {
            Ok(staged) => staged,
            Err(StageError::Stream(e)) => return ModelOutcome::FetchFailed(e),
            Err(StageError::Local(e)) => return ModelOutcome::Failed(e.into()),
        };

        match expected {
            Some(expected) if staged != expected => {
                discard(staging);
                warn!(expected = %expected, actual = %staged, "model hash mismatch, download discarded");
                ModelOutcome::VerificationFailed {
                    expected,
                    actual: staged,
                }
            }
            Some(_) => self.commit(staging, staged, true),
            None if local.as_ref() == Some(&staged) => {
                discard(staging);
                debug!(sha256 = %staged, "unverified download identical to local model");
                ModelOutcome::UpToDate
            }
            None => {
                warn!(sha256 = %staged, "remote sent no model hash, installing unverified model");
                self.commit(staging, staged, false)
            }
        }
    }

    /// Lists staging files left next to the artifact.
    ///
    /// Empty unless a cycle is in flight or a process died mid-download.
    pub fn staging_files(&self) -> io::Result<Vec<PathBuf>> {
        let dir = match self.artifact_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let Some(name) = self.artifact_path.file_name().and_then(|n| n.to_str()) else {
            return Ok(Vec::new());
        };
        let prefix = format!(".{name}.");

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&prefix) && file_name.ends_with(STAGING_SUFFIX) {
                files.push(entry.path());
            }
        }
        Ok(files)
    }

    /// Streams `body` into a new staging file and returns it with its
    /// on-disk hash.
    fn stage(
        &self,
        mut body: Box<dyn Read + Send>,
    ) -> Result<(NamedTempFile, ContentHash), StageError> {
        if let Some(parent) = self.artifact_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(StageError::Local)?;
        }

        let mut staging =
            sibling_temp(&self.artifact_path, STAGING_SUFFIX).map_err(StageError::Local)?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            if self.is_cancelled() {
                return Err(StageError::Stream(SyncError::Cancelled));
            }
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(StageError::Stream(stream_error(e))),
            };
            staging.write_all(&buf[..n]).map_err(StageError::Local)?;
            total += n as u64;
        }
        staging.as_file().sync_all().map_err(StageError::Local)?;

        debug!(bytes = total, path = %staging.path().display(), "model staged");
        match checksum::sha256_file(staging.path()) {
            Ok(Some(hash)) => Ok((staging, hash)),
            Ok(None) => Err(StageError::Local(io::Error::new(
                ErrorKind::NotFound,
                "staging file vanished",
            ))),
            Err(e) => Err(StageError::Local(e)),
        }
    }

    fn commit(&self, staging: NamedTempFile, sha256: ContentHash, verified: bool) -> ModelOutcome {
        if let Err(e) = staging.persist(&self.artifact_path) {
            return ModelOutcome::Failed(e.error.into());
        }
        let parent = self.artifact_path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Err(e) = sync_directory(parent) {
            return ModelOutcome::Failed(e.into());
        }

        info!(sha256 = %sha256, verified, path = %self.artifact_path.display(), "model updated");
        ModelOutcome::Updated { sha256, verified }
    }
}

fn discard(staging: NamedTempFile) {
    let path = staging.path().to_path_buf();
    if let Err(e) = staging.close() {
        warn!(error = %e, path = %path.display(), "cannot remove staging file");
    }
}

fn stream_error(err: io::Error) -> SyncError {
    if err.kind() == ErrorKind::TimedOut {
        SyncError::Timeout
    } else {
        SyncError::transport_retryable(format!("model body: {err}"))
    }
}
