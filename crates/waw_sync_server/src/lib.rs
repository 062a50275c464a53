//! # waw Sync Server
//!
//! In-process reference implementation of the remote that the waw sync
//! engine talks to.
//!
//! This crate provides:
//! - Profile upsert and delete keyed by id (`POST /profile`,
//!   `DELETE /profile/{id}`)
//! - Latest model download with its SHA-256 in the `X-Model-SHA256`
//!   header (`GET /model/latest`)
//! - FastAPI-compatible error bodies (`{"detail": "..."}`)
//!
//! The server does not listen on a socket. Requests are routed through
//! [`SyncServer::handle`], which makes it usable as a loopback remote in
//! tests and embeddable behind any HTTP front end.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod model;
mod registry;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use model::ModelRepository;
pub use registry::ProfileRegistry;
pub use server::{ServerResponse, SyncServer};
