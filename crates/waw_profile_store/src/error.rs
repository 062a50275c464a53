//! Error types for profile store operations.

use std::io;
use thiserror::Error;

/// Result type for profile store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while reading or writing the profile store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store file is not in the expected format.
    #[error("profile store corrupted: {0}")]
    Corrupted(String),

    /// Decryption failed (wrong master key or tampered file).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Encryption or key derivation failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// The record could not be serialized.
    #[error("record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// An upsert would move `updated_at` backwards.
    #[error("stale update for profile {id}: updated_at {attempted} is older than stored {stored}")]
    StaleUpdate {
        /// Profile identifier.
        id: String,
        /// Stored `updated_at` text.
        stored: String,
        /// Rejected `updated_at` text.
        attempted: String,
    },

    /// A record whose `updated_at` precedes its `created_at`.
    #[error("profile {id}: updated_at {updated_at} precedes created_at {created_at}")]
    InvalidTimestamps {
        /// Profile identifier.
        id: String,
        /// `created_at` text.
        created_at: String,
        /// `updated_at` text.
        updated_at: String,
    },
}

impl StoreError {
    /// Returns true if the error was caused by the caller's input rather
    /// than the state of the store.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            StoreError::StaleUpdate { .. } | StoreError::InvalidTimestamps { .. }
        )
    }
}
