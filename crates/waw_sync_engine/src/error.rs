//! Error types for the sync engine.

use thiserror::Error;
use waw_sync_protocol::ProtocolError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Longest remote body excerpt kept in a [`SyncError::RemoteRejection`].
const MAX_BODY_EXCERPT: usize = 512;

/// Errors that can occur during a reconciliation cycle.
///
/// None of these are fatal to the scheduler: every variant ends the current
/// cycle and the work is retried on the next tick.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Request timed out.
    #[error("operation timed out")]
    Timeout,

    /// Remote answered with a non-success status.
    #[error("remote rejected request with status {status}: {body}")]
    RemoteRejection {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },

    /// Remote response could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Downloaded bytes do not match the advertised hash.
    #[error("integrity check failed: expected {expected}, got {actual}")]
    Integrity {
        /// Hash advertised by the remote.
        expected: String,
        /// Hash of the received bytes.
        actual: String,
    },

    /// Local state (marker file, timestamps) is unreadable or malformed.
    #[error("local state error: {0}")]
    LocalState(String),

    /// Failed to persist the marker, staging file or artifact.
    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// The local profile store failed.
    #[error("profile store error: {0}")]
    LocalStore(#[from] waw_profile_store::StoreError),

    /// The cycle was cancelled by a shutdown.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a rejection, keeping at most the first 512 bytes of the body.
    pub fn rejection(status: u16, body: &[u8]) -> Self {
        let end = body.len().min(MAX_BODY_EXCERPT);
        Self::RemoteRejection {
            status,
            body: String::from_utf8_lossy(&body[..end]).into_owned(),
        }
    }

    /// Returns true if this error can be retried on the next tick.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout
            | SyncError::RemoteRejection { .. }
            | SyncError::Integrity { .. }
            | SyncError::Persistence(_)
            | SyncError::LocalStore(_) => true,
            SyncError::Protocol(_) | SyncError::LocalState(_) | SyncError::Cancelled => false,
        }
    }

    /// Returns true if the error came from talking to the remote.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SyncError::Transport { .. }
                | SyncError::Timeout
                | SyncError::RemoteRejection { .. }
                | SyncError::Protocol(_)
                | SyncError::Cancelled
        )
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        SyncError::Protocol(err.to_string())
    }
}
