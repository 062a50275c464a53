//! In-memory profile registry.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use waw_sync_protocol::{ProfilePayload, StoredProfile};

/// Profiles held by the remote, keyed by id.
///
/// Upserts replace the whole record, so applying the same payload twice
/// leaves the registry as applying it once.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: RwLock<HashMap<String, StoredProfile>>,
    upserts: AtomicU64,
}

impl ProfileRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a profile and returns the stored form together
    /// with the number of profiles now held.
    pub fn upsert(&self, payload: &ProfilePayload) -> (StoredProfile, usize) {
        let stored = StoredProfile::from_payload(payload);
        let mut profiles = self.profiles.write();
        profiles.insert(stored.id.clone(), stored.clone());
        self.upserts.fetch_add(1, Ordering::SeqCst);
        (stored, profiles.len())
    }

    /// Removes a profile. Returns false if it did not exist.
    pub fn delete(&self, id: &str) -> bool {
        self.profiles.write().remove(id).is_some()
    }

    /// Returns a profile by id.
    pub fn get(&self, id: &str) -> Option<StoredProfile> {
        self.profiles.read().get(id).cloned()
    }

    /// Number of profiles held.
    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    /// Returns true if no profile is held.
    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }

    /// Number of upserts accepted since creation, including repeats.
    pub fn upsert_count(&self) -> u64 {
        self.upserts.load(Ordering::SeqCst)
    }
}
