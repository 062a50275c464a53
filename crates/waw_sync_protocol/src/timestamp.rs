//! Logical timestamps used for profile change detection.

use crate::error::{ProtocolError, ProtocolResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Naive date-time layouts accepted by [`LogicalTimestamp::parse`].
///
/// `%.f` also matches when no fractional part is present.
const NAIVE_LAYOUTS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Seconds since the Unix epoch, used only for ordering and change detection.
///
/// The value is not expected to be wall-clock accurate; two snapshots are
/// considered the same revision when their logical timestamps are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalTimestamp(i64);

impl LogicalTimestamp {
    /// The oldest representable revision.
    pub const ZERO: LogicalTimestamp = LogicalTimestamp(0);

    /// Creates a timestamp from seconds since the epoch.
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Returns seconds since the epoch.
    pub const fn as_secs(self) -> i64 {
        self.0
    }

    /// Returns the current wall-clock time, truncated to whole seconds.
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    /// Parses timestamp text as stored by the local profile store.
    ///
    /// Accepted forms, tried in order:
    /// - RFC 3339 with an offset (`2025-05-09T07:09:13.358045+00:00`)
    /// - a naive date-time, `T` or space separated, read as UTC
    /// - a bare date, read as midnight UTC
    /// - a decimal integer of seconds since the epoch
    ///
    /// Sub-second precision is truncated.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidTimestamp`] when none of the forms match.
    pub fn parse(text: &str) -> ProtocolResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ProtocolError::invalid_timestamp(text));
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self(dt.timestamp()));
        }

        for layout in NAIVE_LAYOUTS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, layout) {
                return Ok(Self(naive.and_utc().timestamp()));
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(Self(midnight.and_utc().timestamp()));
            }
        }

        trimmed
            .parse::<i64>()
            .map(Self)
            .map_err(|_| ProtocolError::invalid_timestamp(text))
    }

    /// Renders the timestamp as an ISO-8601 UTC string with a `Z` suffix.
    ///
    /// Returns `None` if the value is outside chrono's representable range.
    pub fn to_iso8601(self) -> Option<String> {
        DateTime::<Utc>::from_timestamp(self.0, 0)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
    }
}

impl From<i64> for LogicalTimestamp {
    fn from(secs: i64) -> Self {
        Self(secs)
    }
}

impl fmt::Display for LogicalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
