//! Request handlers for the profile and model endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::model::ModelRepository;
use crate::registry::ProfileRegistry;
use std::sync::Arc;
use tracing::{debug, info};
use waw_sync_protocol::{ContentHash, ProfilePayload, UpsertResponse};

/// State shared by all handlers.
#[derive(Debug)]
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Profiles received from clients.
    pub profiles: Arc<ProfileRegistry>,
    /// Model served to clients.
    pub model: Arc<ModelRepository>,
}

impl HandlerContext {
    /// Creates a context with an empty registry and the configured model
    /// path.
    pub fn new(config: ServerConfig) -> Self {
        let model = Arc::new(ModelRepository::new(config.model_path.clone()));
        Self {
            config,
            profiles: Arc::new(ProfileRegistry::new()),
            model,
        }
    }
}

/// Handler for sync requests.
#[derive(Debug)]
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    fn check_size(&self, body: &[u8]) -> ServerResult<()> {
        let max = self.context.config.max_body_bytes;
        if body.len() > max {
            return Err(ServerError::PayloadTooLarge {
                size: body.len(),
                max,
            });
        }
        Ok(())
    }

    /// Handles `POST /profile`.
    pub fn handle_upsert(&self, body: &[u8]) -> ServerResult<UpsertResponse> {
        self.check_size(body)?;
        let payload =
            ProfilePayload::decode(body).map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
        if payload.id.is_empty() {
            return Err(ServerError::InvalidRequest("id must not be empty".into()));
        }

        let (stored, count) = self.context.profiles.upsert(&payload);
        info!(id = %stored.id, updated_at = %stored.updated_at, count, "profile upserted");
        Ok(UpsertResponse::ok(count, stored))
    }

    /// Handles `DELETE /profile/{id}`.
    pub fn handle_delete(&self, id: &str) -> ServerResult<serde_json::Value> {
        if !self.context.profiles.delete(id) {
            return Err(ServerError::NotFound("Profile not found".into()));
        }
        info!(id, "profile deleted");
        Ok(serde_json::json!({ "status": "deleted", "id": id }))
    }

    /// Handles `GET /model/latest`.
    pub fn handle_model(&self) -> ServerResult<(Vec<u8>, ContentHash)> {
        let (bytes, hash) = self
            .context
            .model
            .latest()?
            .ok_or_else(|| ServerError::NotFound("Model not found".into()))?;
        debug!(sha256 = %hash, bytes = bytes.len(), "serving model");
        Ok((bytes, hash))
    }
}
