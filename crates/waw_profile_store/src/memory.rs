//! In-memory profile store for testing.

use crate::error::StoreResult;
use crate::snapshot::ProfileSnapshot;
use crate::store::ProfileStore;
use parking_lot::RwLock;

/// An in-memory profile store.
///
/// Suitable for unit and integration tests. Contents are lost on drop.
///
/// # Example
///
/// ```rust
/// use waw_profile_store::{MemoryProfileStore, ProfileSnapshot, ProfileStore};
///
/// let store = MemoryProfileStore::with_profile(ProfileSnapshot::new("1", "1000"));
/// assert!(store.delete_profile("1").unwrap());
/// assert!(store.get_profile().unwrap().is_none());
/// ```
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profile: RwLock<Option<ProfileSnapshot>>,
}

impl MemoryProfileStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `profile` as-is, bypassing the upsert checks.
    ///
    /// Useful for seeding malformed records in tests.
    #[must_use]
    pub fn with_profile(profile: ProfileSnapshot) -> Self {
        Self {
            profile: RwLock::new(Some(profile)),
        }
    }

    /// Overwrites the stored record without any checks.
    pub fn replace(&self, profile: Option<ProfileSnapshot>) {
        *self.profile.write() = profile;
    }
}

impl ProfileStore for MemoryProfileStore {
    fn get_profile(&self) -> StoreResult<Option<ProfileSnapshot>> {
        Ok(self.profile.read().clone())
    }

    fn put_profile(&self, profile: ProfileSnapshot) -> StoreResult<ProfileSnapshot> {
        let mut slot = self.profile.write();
        let merged = profile.merge_into(slot.as_ref())?;
        *slot = Some(merged.clone());
        Ok(merged)
    }

    fn delete_profile(&self, id: &str) -> StoreResult<bool> {
        let mut slot = self.profile.write();
        if slot.as_ref().is_some_and(|p| p.id == id) {
            *slot = None;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn empty_store() {
        let store = MemoryProfileStore::new();
        assert!(store.get_profile().unwrap().is_none());
        assert!(!store.delete_profile("1").unwrap());
    }

    #[test]
    fn put_get_delete() {
        let store = MemoryProfileStore::new();
        store
            .put_profile(ProfileSnapshot::new("1", "1000").with_name("A"))
            .unwrap();

        let profile = store.get_profile().unwrap().unwrap();
        assert_eq!(profile.id, "1");
        assert_eq!(profile.name.as_deref(), Some("A"));

        assert!(!store.delete_profile("2").unwrap());
        assert!(store.delete_profile("1").unwrap());
        assert!(store.get_profile().unwrap().is_none());
    }

    #[test]
    fn put_enforces_invariants() {
        let store = MemoryProfileStore::new();
        store.put_profile(ProfileSnapshot::new("1", "1000")).unwrap();

        let stale = ProfileSnapshot::new("1", "1000").with_updated_at("999");
        assert!(matches!(
            store.put_profile(stale),
            Err(StoreError::StaleUpdate { .. })
        ));

        let newer = ProfileSnapshot::new("1", "2000");
        let stored = store.put_profile(newer).unwrap();
        assert_eq!(stored.created_at, "1000");
        assert_eq!(stored.updated_at, "2000");
    }
}
