//! CLI command implementations.

pub mod once;
pub mod profile;
pub mod run;
pub mod status;
