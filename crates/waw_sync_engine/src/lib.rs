//! # waw Sync Engine
//!
//! Keeps a local profile and a local model artifact consistent with a
//! remote authority by polling.
//!
//! This crate provides:
//! - [`MarkerStore`]: the persisted "last synced" logical timestamp
//! - [`checksum`]: SHA-256 of files and streams
//! - [`RemoteProfileClient`] / [`RemoteModelClient`]: the remote contract,
//!   with an HTTP implementation and mocks
//! - [`ProfileReconciler`]: one-way, idempotent profile upload
//! - [`ModelReconciler`]: verified, atomic model download
//! - [`SyncScheduler`]: independent periodic runs with failure isolation
//!
//! ## Data flow
//!
//! ```text
//! profile store ─► ProfileReconciler ─► RemoteProfileClient ─► remote
//! remote ─► RemoteModelClient ─► ModelReconciler ─► model artifact
//! ```
//!
//! The two reconcilers share no state. The scheduler is the only thing that
//! knows about both.
//!
//! ## Key Invariants
//!
//! - The marker is written only after the remote acknowledged the push
//! - The marker never decreases
//! - Nothing is written when the local artifact already matches the remote hash
//! - Only bytes whose hash matches the advertised hash replace the artifact
//! - The artifact is replaced by a single rename; readers never see a partial file
//! - No cycle outcome, error or panic stops the scheduler

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code must not panic on I/O or remote input.
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod checksum;
mod config;
mod error;
mod http;
mod marker;
mod model;
mod profile;
mod scheduler;
mod transport;

pub use config::{MissingChecksumPolicy, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use http::{
    HttpClient, HttpRemote, HttpResponse, HttpStream, LoopbackClient, LoopbackServer,
    ReqwestClient,
};
pub use marker::{MarkerStore, SyncMarker};
pub use model::{ModelOutcome, ModelReconciler};
pub use profile::{ProfileOutcome, ProfileReconciler, SkipReason};
pub use scheduler::{
    CycleOutcome, Reconcile, ReconcilerStats, SchedulerHandle, SchedulerStats, SyncScheduler,
};
pub use transport::{
    MockModelClient, MockProfileClient, ModelDownload, RemoteModelClient, RemoteModelDescriptor,
    RemoteProfileClient,
};
