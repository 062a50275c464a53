//! Error types for the sync protocol.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors produced while parsing or encoding protocol values.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Timestamp text could not be interpreted.
    #[error("invalid timestamp {value:?}")]
    InvalidTimestamp {
        /// The rejected input.
        value: String,
    },

    /// Content hash is not a 64 character hex SHA-256 digest.
    #[error("invalid content hash {value:?}: {reason}")]
    InvalidContentHash {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Creates an invalid timestamp error.
    pub fn invalid_timestamp(value: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            value: value.into(),
        }
    }
}
