//! Error types for the sync server.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Request body failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request body exceeds the configured limit.
    #[error("request body of {size} bytes exceeds limit of {max}")]
    PayloadTooLarge {
        /// Body size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// No such resource.
    #[error("{0}")]
    NotFound(String),

    /// The path exists but not for this method.
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 422,
            ServerError::PayloadTooLarge { .. } => 413,
            ServerError::NotFound(_) => 404,
            ServerError::MethodNotAllowed { .. } => 405,
            ServerError::Internal(_) | ServerError::Io(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}
