//! One-way profile upload.

use crate::error::{SyncError, SyncResult};
use crate::marker::MarkerStore;
use crate::transport::RemoteProfileClient;
use std::fmt;
use tracing::{debug, info, warn};
use waw_profile_store::ProfileStore;
use waw_sync_protocol::{LogicalTimestamp, ProfilePayload};

/// Why a profile cycle did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The local store holds no profile.
    NoProfile,
    /// The profile's `updated_at` equals the sync marker.
    Unchanged,
}

/// Result of one profile reconciliation cycle.
#[derive(Debug)]
pub enum ProfileOutcome {
    /// Nothing to push.
    Skipped(SkipReason),
    /// The remote acknowledged the profile.
    Pushed {
        /// Logical timestamp that was pushed.
        updated_at: LogicalTimestamp,
        /// False when the pushed profile was older than the marker, which
        /// then stays where it was.
        marker_advanced: bool,
    },
    /// The cycle failed; the marker is unchanged.
    Failed(SyncError),
}

impl ProfileOutcome {
    /// Returns true for [`ProfileOutcome::Failed`].
    pub fn is_failure(&self) -> bool {
        matches!(self, ProfileOutcome::Failed(_))
    }
}

impl fmt::Display for ProfileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileOutcome::Skipped(SkipReason::NoProfile) => write!(f, "skipped: no local profile"),
            ProfileOutcome::Skipped(SkipReason::Unchanged) => write!(f, "skipped: unchanged"),
            ProfileOutcome::Pushed {
                updated_at,
                marker_advanced: true,
            } => write!(f, "pushed updated_at={updated_at}"),
            ProfileOutcome::Pushed { updated_at, .. } => {
                write!(f, "pushed updated_at={updated_at} (older than marker)")
            }
            ProfileOutcome::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// Pushes the local profile to the remote when it changed since the last
/// acknowledged push.
///
/// Change detection compares the profile's `updated_at` with the persisted
/// marker. The marker moves only after the remote accepted the push, so a
/// failed cycle is simply retried later; since the remote upserts by id a
/// repeated push is harmless.
///
/// # Example
///
/// ```no_run
/// use waw_profile_store::MemoryProfileStore;
/// use waw_sync_engine::{MarkerStore, MockProfileClient, ProfileReconciler};
///
/// let reconciler = ProfileReconciler::new(
///     MemoryProfileStore::new(),
///     MockProfileClient::new(),
///     MarkerStore::new("state.json"),
/// );
/// println!("{}", reconciler.reconcile());
/// ```
#[derive(Debug)]
pub struct ProfileReconciler<S, C> {
    store: S,
    client: C,
    marker: MarkerStore,
}

impl<S: ProfileStore, C: RemoteProfileClient> ProfileReconciler<S, C> {
    /// Creates a reconciler.
    pub fn new(store: S, client: C, marker: MarkerStore) -> Self {
        Self {
            store,
            client,
            marker,
        }
    }

    /// Returns the marker store.
    pub fn marker(&self) -> &MarkerStore {
        &self.marker
    }

    /// Returns the remote client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Runs one cycle. Never panics on I/O or remote errors.
    pub fn reconcile(&self) -> ProfileOutcome {
        self.try_reconcile().unwrap_or_else(ProfileOutcome::Failed)
    }

    fn try_reconcile(&self) -> SyncResult<ProfileOutcome> {
        let Some(snapshot) = self.store.get_profile()? else {
            debug!("no local profile");
            return Ok(ProfileOutcome::Skipped(SkipReason::NoProfile));
        };

        let updated_at = snapshot.updated_at_logical().unwrap_or_else(|e| {
            warn!(
                id = %snapshot.id,
                updated_at = %snapshot.updated_at,
                error = %e,
                "unparseable updated_at, treating profile as oldest"
            );
            LogicalTimestamp::ZERO
        });

        if self.marker.load_or_absent() == Some(updated_at) {
            debug!(updated_at = updated_at.as_secs(), "profile unchanged since last sync");
            return Ok(ProfileOutcome::Skipped(SkipReason::Unchanged));
        }

        let payload = ProfilePayload {
            id: snapshot.id,
            name: snapshot.name,
            email: snapshot.email,
            phone: snapshot.phone,
            updated_at,
        };
        self.client.push_profile(&payload)?;

        let marker_advanced = self.marker.advance(updated_at)?;
        if marker_advanced {
            info!(id = %payload.id, updated_at = updated_at.as_secs(), "profile synced");
        } else {
            warn!(
                id = %payload.id,
                updated_at = updated_at.as_secs(),
                "pushed profile older than sync marker, marker kept"
            );
        }

        Ok(ProfileOutcome::Pushed {
            updated_at,
            marker_advanced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};
    use waw_profile_store::{MemoryProfileStore, ProfileSnapshot};
    use crate::transport::MockProfileClient;

    fn snapshot(updated_at: &str) -> ProfileSnapshot {
        ProfileSnapshot::new("user-1", "2025-01-01T00:00:00Z")
            .with_name("Alice")
            .with_email("alice@example.com")
            .with_updated_at(updated_at)
    }

    fn setup(
        profile: Option<ProfileSnapshot>,
    ) -> (TempDir, ProfileReconciler<MemoryProfileStore, MockProfileClient>) {
        let dir = tempdir().unwrap();
        let store = MemoryProfileStore::new();
        store.replace(profile);
        let reconciler = ProfileReconciler::new(
            store,
            MockProfileClient::new(),
            MarkerStore::new(dir.path().join("state.json")),
        );
        (dir, reconciler)
    }

    #[test]
    fn no_profile_is_skipped() {
        let (_dir, reconciler) = setup(None);
        assert!(matches!(
            reconciler.reconcile(),
            ProfileOutcome::Skipped(SkipReason::NoProfile)
        ));
        assert_eq!(reconciler.client().call_count(), 0);
        assert!(!reconciler.marker().path().exists());
    }

    #[test]
    fn first_sync_pushes_and_sets_marker() {
        let (_dir, reconciler) = setup(Some(snapshot("1000")));

        match reconciler.reconcile() {
            ProfileOutcome::Pushed {
                updated_at,
                marker_advanced,
            } => {
                assert_eq!(updated_at.as_secs(), 1000);
                assert!(marker_advanced);
            }
            other => panic!("unexpected {other}"),
        }
        let pushed = reconciler.client().current().unwrap();
        assert_eq!(pushed.id, "user-1");
        assert_eq!(pushed.email.as_deref(), Some("alice@example.com"));
        assert_eq!(
            reconciler.marker().load().unwrap(),
            Some(LogicalTimestamp::from_secs(1000))
        );
    }

    #[test]
    fn unchanged_profile_makes_no_remote_call() {
        let (_dir, reconciler) = setup(Some(snapshot("1000")));
        reconciler.marker().store(LogicalTimestamp::from_secs(1000)).unwrap();

        assert!(matches!(
            reconciler.reconcile(),
            ProfileOutcome::Skipped(SkipReason::Unchanged)
        ));
        assert_eq!(reconciler.client().call_count(), 0);
    }

    #[test]
    fn iso_timestamp_is_pushed_as_integer() {
        let (_dir, reconciler) = setup(Some(snapshot("2025-05-09T07:09:13.123456")));
        reconciler.reconcile();

        let pushed = reconciler.client().current().unwrap();
        assert_eq!(pushed.updated_at.as_secs(), 1_746_774_553);
        let json: serde_json::Value = serde_json::from_slice(&pushed.encode().unwrap()).unwrap();
        assert_eq!(json["updated_at"], 1_746_774_553);
    }

    #[test]
    fn failed_push_leaves_marker() {
        let (_dir, reconciler) = setup(Some(snapshot("2000")));
        reconciler.marker().store(LogicalTimestamp::from_secs(1000)).unwrap();
        reconciler.client().set_failing(true);

        let outcome = reconciler.reconcile();
        assert!(outcome.is_failure());
        assert_eq!(
            reconciler.marker().load().unwrap(),
            Some(LogicalTimestamp::from_secs(1000))
        );

        reconciler.client().set_failing(false);
        assert!(matches!(reconciler.reconcile(), ProfileOutcome::Pushed { .. }));
        assert_eq!(
            reconciler.marker().load().unwrap(),
            Some(LogicalTimestamp::from_secs(2000))
        );
    }

    #[test]
    fn unparseable_timestamp_is_oldest() {
        let (_dir, reconciler) = setup(Some(snapshot("yesterday-ish")));

        match reconciler.reconcile() {
            ProfileOutcome::Pushed { updated_at, .. } => assert_eq!(updated_at, LogicalTimestamp::ZERO),
            other => panic!("unexpected {other}"),
        }
        // Marker now equals the fallback, so the next cycle is quiet.
        assert!(matches!(
            reconciler.reconcile(),
            ProfileOutcome::Skipped(SkipReason::Unchanged)
        ));
    }

    #[test]
    fn stale_profile_does_not_lower_marker() {
        let (_dir, reconciler) = setup(Some(snapshot("500")));
        reconciler.marker().store(LogicalTimestamp::from_secs(1000)).unwrap();

        match reconciler.reconcile() {
            ProfileOutcome::Pushed {
                marker_advanced, ..
            } => assert!(!marker_advanced),
            other => panic!("unexpected {other}"),
        }
        assert_eq!(
            reconciler.marker().load().unwrap(),
            Some(LogicalTimestamp::from_secs(1000))
        );
    }

    #[test]
    fn malformed_marker_degrades_to_absent() {
        let (_dir, reconciler) = setup(Some(snapshot("1000")));
        fs::write(reconciler.marker().path(), b"garbage").unwrap();

        assert!(matches!(reconciler.reconcile(), ProfileOutcome::Pushed { .. }));
        assert_eq!(
            reconciler.marker().load().unwrap(),
            Some(LogicalTimestamp::from_secs(1000))
        );
    }

    #[test]
    fn marker_write_failure_is_reported() {
        let dir = tempdir().unwrap();
        // A plain file where the marker's directory should be.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let reconciler = ProfileReconciler::new(
            MemoryProfileStore::with_profile(snapshot("1000")),
            MockProfileClient::new(),
            MarkerStore::new(blocker.join("state.json")),
        );
        assert!(matches!(
            reconciler.reconcile(),
            ProfileOutcome::Failed(SyncError::Persistence(_))
        ));
        assert_eq!(reconciler.client().call_count(), 1);
    }
}
