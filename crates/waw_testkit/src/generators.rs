//! Property-based test generators using proptest.

use crate::fixtures::sample_profile;
use proptest::prelude::*;
use waw_profile_store::ProfileSnapshot;

/// Upper bound for generated timestamps (2100-01-01).
const MAX_SECS: i64 = 4_102_444_800;

/// Strategy for logical timestamps in seconds.
pub fn timestamp_strategy() -> impl Strategy<Value = i64> {
    0..MAX_SECS
}

/// Strategy for profile ids.
pub fn profile_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9][a-z0-9-]{0,35}").expect("Invalid regex")
}

/// Strategy for profiles with parseable timestamps.
pub fn profile_strategy() -> impl Strategy<Value = ProfileSnapshot> {
    (profile_id_strategy(), timestamp_strategy())
        .prop_map(|(id, secs)| sample_profile(&id, secs))
}

/// Strategy for model bodies.
pub fn model_bytes_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

/// One profile cycle in a generated history.
#[derive(Debug, Clone)]
pub struct SyncStep {
    /// `updated_at` of the local profile during this cycle.
    pub updated_at: i64,
    /// Whether the remote rejects the push.
    pub remote_fails: bool,
}

/// Strategy for histories of profile cycles. Timestamps go up and down, a
/// small pool of values makes repeats likely.
pub fn sync_history_strategy() -> impl Strategy<Value = Vec<SyncStep>> {
    let step = (
        prop_oneof![0i64..20, timestamp_strategy()],
        prop::bool::weighted(0.25),
    )
        .prop_map(|(updated_at, remote_fails)| SyncStep {
            updated_at,
            remote_fails,
        });
    prop::collection::vec(step, 1..40)
}
