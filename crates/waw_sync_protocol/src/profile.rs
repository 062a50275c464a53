//! Profile upload messages.

use crate::error::ProtocolResult;
use crate::timestamp::LogicalTimestamp;
use serde::{Deserialize, Deserializer, Serialize};

/// Path of the profile upsert endpoint. Deletes use `{PROFILE_PATH}/{id}`.
pub const PROFILE_PATH: &str = "/profile";

/// Body of a profile upsert (`POST /profile`).
///
/// The remote upserts by `id`, so sending the same payload twice leaves the
/// remote in the same state as sending it once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePayload {
    /// Stable user identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Revision of the profile, always sent as an integer.
    ///
    /// Decoding also accepts timestamp text so older clients that forward
    /// the raw ISO string are understood.
    #[serde(deserialize_with = "integer_or_text")]
    pub updated_at: LogicalTimestamp,
}

impl ProfilePayload {
    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn integer_or_text<'de, D>(deserializer: D) -> Result<LogicalTimestamp, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Secs(secs) => Ok(LogicalTimestamp::from_secs(secs)),
        Raw::Text(text) => LogicalTimestamp::parse(&text).map_err(serde::de::Error::custom),
    }
}

/// A profile as held by the remote, with `updated_at` rendered as ISO text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProfile {
    /// Stable user identifier.
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// ISO-8601 UTC rendering of the payload's logical timestamp.
    pub updated_at: String,
}

impl StoredProfile {
    /// Builds the stored view of an accepted payload.
    pub fn from_payload(payload: &ProfilePayload) -> Self {
        Self {
            id: payload.id.clone(),
            name: payload.name.clone(),
            email: payload.email.clone(),
            phone: payload.phone.clone(),
            updated_at: payload
                .updated_at
                .to_iso8601()
                .unwrap_or_else(|| payload.updated_at.to_string()),
        }
    }
}

/// Response body of a successful upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertResponse {
    /// Always `"ok"` on success.
    pub status: String,
    /// Number of profiles the remote now holds.
    pub count: usize,
    /// The profile as stored.
    pub stored: StoredProfile,
}

impl UpsertResponse {
    /// Creates a success response.
    pub fn ok(count: usize, stored: StoredProfile) -> Self {
        Self {
            status: "ok".into(),
            count,
            stored,
        }
    }

    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
