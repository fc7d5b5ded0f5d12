//! Error types for the haven daemon.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use haven_types::HavenError;
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-level error: a core error plus its HTTP rendering.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub HavenError);

/// Error response body; carries a stable code, never a stack trace.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            HavenError::NotAuthorized(_) => StatusCode::FORBIDDEN,
            HavenError::InvalidState { .. }
            | HavenError::AlreadyAccepted
            | HavenError::MustAcceptFirst => StatusCode::CONFLICT,
            HavenError::NotFound(_) => StatusCode::NOT_FOUND,
            HavenError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            HavenError::CommitFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            HavenError::SequenceConflict { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorResponse {
            success: false,
            error: self.0.to_string(),
            code: self.0.code().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
