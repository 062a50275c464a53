//! # waw Sync Protocol
//!
//! Wire types shared by the waw sync engine and its reference backend.
//!
//! This crate provides:
//! - [`LogicalTimestamp`] for change detection, with lenient parsing of
//!   the timestamp text kept in the local profile store
//! - [`ProfilePayload`] and [`UpsertResponse`] for the profile endpoint
//! - [`ContentHash`] for content-addressed model artifacts
//! - Endpoint paths and header names
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod model;
mod profile;
mod timestamp;

pub use error::{ProtocolError, ProtocolResult};
pub use model::{ContentHash, MODEL_LATEST_PATH, MODEL_SHA256_HEADER};
pub use profile::{ProfilePayload, StoredProfile, UpsertResponse, PROFILE_PATH};
pub use timestamp::LogicalTimestamp;
