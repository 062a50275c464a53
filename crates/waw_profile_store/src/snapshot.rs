//! The locally stored profile record.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use waw_sync_protocol::{LogicalTimestamp, ProtocolResult};

/// The single user profile held by the local store.
///
/// Timestamps are kept as the text the writer supplied. They are parsed on
/// demand with [`LogicalTimestamp::parse`]; a record with unparseable
/// timestamps is still a valid record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    /// Stable user identifier.
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// When the profile was first written.
    pub created_at: String,
    /// When the profile was last changed.
    pub updated_at: String,
}

impl ProfileSnapshot {
    /// Creates a profile whose `created_at` and `updated_at` are both `now`.
    pub fn new(id: impl Into<String>, now: impl Into<String>) -> Self {
        let now = now.into();
        Self {
            id: id.into(),
            name: None,
            email: None,
            phone: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the phone number.
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Sets `updated_at`.
    pub fn with_updated_at(mut self, updated_at: impl Into<String>) -> Self {
        self.updated_at = updated_at.into();
        self
    }

    /// Parses `updated_at` into a logical timestamp.
    pub fn updated_at_logical(&self) -> ProtocolResult<LogicalTimestamp> {
        LogicalTimestamp::parse(&self.updated_at)
    }

    /// Parses `created_at` into a logical timestamp.
    pub fn created_at_logical(&self) -> ProtocolResult<LogicalTimestamp> {
        LogicalTimestamp::parse(&self.created_at)
    }

    /// Applies the store invariants for upserting `self` over `existing`.
    ///
    /// Returns the record that should be persisted: `created_at` is carried
    /// over from `existing` when the ids match. Ordering checks only apply
    /// when both sides parse.
    ///
    /// # Errors
    ///
    /// - [`StoreError::StaleUpdate`] if `updated_at` would move backwards
    /// - [`StoreError::InvalidTimestamps`] if `updated_at < created_at`
    pub fn merge_into(mut self, existing: Option<&ProfileSnapshot>) -> StoreResult<Self> {
        if let Some(existing) = existing.filter(|e| e.id == self.id) {
            self.created_at = existing.created_at.clone();

            if let (Ok(stored), Ok(incoming)) =
                (existing.updated_at_logical(), self.updated_at_logical())
            {
                if incoming < stored {
                    return Err(StoreError::StaleUpdate {
                        id: self.id,
                        stored: existing.updated_at.clone(),
                        attempted: self.updated_at,
                    });
                }
            }
        }

        if let (Ok(created), Ok(updated)) = (self.created_at_logical(), self.updated_at_logical()) {
            if updated < created {
                return Err(StoreError::InvalidTimestamps {
                    id: self.id,
                    created_at: self.created_at,
                    updated_at: self.updated_at,
                });
            }
        }

        Ok(self)
    }
}
