//! # waw Profile Store
//!
//! Local storage for the single user profile that the sync engine uploads.
//!
//! The store holds at most one [`ProfileSnapshot`]. It is the only writer of
//! that record; the sync engine reads a fresh copy each cycle.
//!
//! ## Available Stores
//!
//! - [`MemoryProfileStore`] - For testing and ephemeral use
//! - [`EncryptedProfileStore`] - AES-256-GCM encrypted file, keyed by a
//!   master secret
//!
//! ## Invariants
//!
//! Every store applies [`ProfileSnapshot::merge_into`] on upsert:
//! - `created_at` is immutable once written for an id
//! - `updated_at` never moves backwards for an id
//! - `updated_at >= created_at`
//!
//! ## Example
//!
//! ```rust
//! use waw_profile_store::{MemoryProfileStore, ProfileSnapshot, ProfileStore};
//!
//! let store = MemoryProfileStore::new();
//! let profile = ProfileSnapshot::new("1", "2025-01-01T00:00:00Z")
//!     .with_name("Alice")
//!     .with_email("alice@example.com");
//! store.put_profile(profile).unwrap();
//! assert_eq!(store.get_profile().unwrap().unwrap().id, "1");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod crypto;
mod encrypted;
mod error;
mod memory;
mod snapshot;
mod store;

pub use crypto::{MasterKey, KEY_SIZE, NONCE_SIZE, SALT_SIZE, TAG_SIZE};
pub use encrypted::EncryptedProfileStore;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryProfileStore;
pub use snapshot::ProfileSnapshot;
pub use store::ProfileStore;
