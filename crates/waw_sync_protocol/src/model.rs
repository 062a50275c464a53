//! Content-addressed model artifact identity.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Path of the endpoint serving the latest model bytes.
pub const MODEL_LATEST_PATH: &str = "/model/latest";

/// Response header carrying the hex SHA-256 of the model body.
pub const MODEL_SHA256_HEADER: &str = "X-Model-SHA256";

/// Length of a hex-encoded SHA-256 digest.
const HEX_LEN: usize = 64;

/// A SHA-256 content hash in lowercase hex.
///
/// Two artifacts are the same version exactly when their hashes are equal.
/// Parsing normalizes case, so `ABC...` and `abc...` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Parses a hex digest as it appears in the [`MODEL_SHA256_HEADER`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidContentHash`] unless the input is
    /// exactly 64 hex characters (surrounding whitespace is ignored).
    pub fn parse(text: &str) -> ProtocolResult<Self> {
        let trimmed = text.trim();
        if trimmed.len() != HEX_LEN {
            return Err(ProtocolError::InvalidContentHash {
                value: text.to_string(),
                reason: format!("expected {HEX_LEN} hex characters, got {}", trimmed.len()),
            });
        }
        hex::decode(trimmed).map_err(|e| ProtocolError::InvalidContentHash {
            value: text.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Builds a hash from a finished SHA-256 digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    /// Hashes an in-memory buffer.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self::from_digest(Sha256::digest(bytes).into())
    }

    /// Returns the lowercase hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
