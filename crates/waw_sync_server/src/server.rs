//! Main sync server.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handler::{HandlerContext, RequestHandler};
use crate::model::ModelRepository;
use crate::registry::ProfileRegistry;
use std::sync::Arc;
use tracing::debug;
use waw_sync_protocol::{MODEL_LATEST_PATH, MODEL_SHA256_HEADER, PROFILE_PATH};

/// A response produced by [`SyncServer::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerResponse {
    /// HTTP status code.
    pub status: u16,
    /// Headers with lowercase names.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl ServerResponse {
    fn json(status: u16, value: &impl serde::Serialize) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                headers: vec![("content-type".into(), "application/json".into())],
                body,
            },
            Err(e) => Self::error(&ServerError::Internal(e.to_string())),
        }
    }

    fn error(err: &ServerError) -> Self {
        let body = serde_json::json!({ "detail": err.to_string() }).to_string();
        Self {
            status: err.status_code(),
            headers: vec![("content-type".into(), "application/json".into())],
            body: body.into_bytes(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The reference remote.
///
/// Routes `(method, path, body)` triples to the profile and model
/// handlers. Errors become FastAPI-style `{"detail": ...}` bodies with the
/// matching status code.
///
/// # Example
///
/// ```
/// use waw_sync_server::{ServerConfig, SyncServer};
///
/// let server = SyncServer::new(ServerConfig::new("/nonexistent/model.bin"));
/// let response = server.handle("POST", "/profile", br#"{"id":"1","updated_at":1000}"#);
/// assert_eq!(response.status, 200);
/// assert_eq!(server.handle("GET", "/model/latest", b"").status, 404);
/// ```
#[derive(Debug)]
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Creates a new sync server.
    pub fn new(config: ServerConfig) -> Self {
        let context = Arc::new(HandlerContext::new(config));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Returns the profile registry.
    pub fn profiles(&self) -> &Arc<ProfileRegistry> {
        &self.context.profiles
    }

    /// Returns the model repository.
    pub fn model(&self) -> &Arc<ModelRepository> {
        &self.context.model
    }

    /// Handles one request. `path` excludes scheme and host.
    pub fn handle(&self, method: &str, path: &str, body: &[u8]) -> ServerResponse {
        let path = path.split('?').next().unwrap_or(path);
        debug!(method, path, bytes = body.len(), "request");

        let result = match (method, path) {
            ("POST", PROFILE_PATH) => self
                .handler
                .handle_upsert(body)
                .map(|response| ServerResponse::json(200, &response)),
            ("DELETE", _) if profile_id(path).is_some() => {
                let id = profile_id(path).unwrap_or_default();
                self.handler
                    .handle_delete(id)
                    .map(|response| ServerResponse::json(200, &response))
            }
            ("GET", MODEL_LATEST_PATH) => self.handler.handle_model().map(|(bytes, hash)| {
                ServerResponse {
                    status: 200,
                    headers: vec![
                        ("content-type".into(), "application/octet-stream".into()),
                        (MODEL_SHA256_HEADER.to_ascii_lowercase(), hash.to_string()),
                    ],
                    body: bytes,
                }
            }),
            (_, PROFILE_PATH | MODEL_LATEST_PATH) => Err(ServerError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            }),
            _ if profile_id(path).is_some() => Err(ServerError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            }),
            _ => Err(ServerError::NotFound("Not Found".into())),
        };

        result.unwrap_or_else(|e| {
            debug!(method, path, status = e.status_code(), error = %e, "request failed");
            ServerResponse::error(&e)
        })
    }
}

/// Extracts `{id}` from `/profile/{id}`.
fn profile_id(path: &str) -> Option<&str> {
    path.strip_prefix(PROFILE_PATH)?
        .strip_prefix('/')
        .filter(|id| !id.is_empty() && !id.contains('/'))
}
