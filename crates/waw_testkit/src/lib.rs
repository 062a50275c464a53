//! # waw Testkit
//!
//! Test utilities for the waw sync crates.
//!
//! This crate provides:
//! - A temporary workspace laying out marker, store and artifact paths
//! - Profile fixtures with consistent timestamps
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use waw_testkit::prelude::*;
//!
//! #[test]
//! fn syncs_once() {
//!     let ws = TempWorkspace::new();
//!     let profile = sample_profile("user-1", 1000);
//!     // ... build reconcilers over ws.marker_path(), ws.artifact_path()
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
