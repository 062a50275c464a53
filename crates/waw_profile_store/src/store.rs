//! Profile store trait definition.

use crate::error::StoreResult;
use crate::snapshot::ProfileSnapshot;
use std::sync::Arc;

/// A durable home for the single local user profile.
///
/// Implementations must be `Send + Sync`: the sync engine reads the profile
/// from a worker thread while other code may edit it.
///
/// # Contract
///
/// - [`get_profile`](Self::get_profile) returns the current record or
///   `None`, read fresh on every call
/// - [`put_profile`](Self::put_profile) upserts, enforcing
///   [`ProfileSnapshot::merge_into`], and returns what was stored
/// - [`delete_profile`](Self::delete_profile) removes the record if its id
///   matches and reports whether anything was removed
pub trait ProfileStore: Send + Sync {
    /// Returns the stored profile, if any.
    fn get_profile(&self) -> StoreResult<Option<ProfileSnapshot>>;

    /// Inserts or replaces the profile.
    fn put_profile(&self, profile: ProfileSnapshot) -> StoreResult<ProfileSnapshot>;

    /// Deletes the profile with the given id.
    fn delete_profile(&self, id: &str) -> StoreResult<bool>;
}

impl<T: ProfileStore + ?Sized> ProfileStore for Arc<T> {
    fn get_profile(&self) -> StoreResult<Option<ProfileSnapshot>> {
        (**self).get_profile()
    }

    fn put_profile(&self, profile: ProfileSnapshot) -> StoreResult<ProfileSnapshot> {
        (**self).put_profile(profile)
    }

    fn delete_profile(&self, id: &str) -> StoreResult<bool> {
        (**self).delete_profile(id)
    }
}
