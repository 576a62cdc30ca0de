//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and its mapping
//! onto HTTP responses. Every non-streaming failure leaves the service as the
//! stable JSON envelope `{"error": <message>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;
use extractor_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No valid identity on the request. Never retried, surfaced verbatim.
    #[error("Unauthorized")]
    Unauthorized,

    /// Record absent, or owned by someone else; deliberately conflated so a
    /// caller cannot probe for existence.
    #[error("{0}")]
    NotFound(String),

    /// Missing or malformed required input.
    #[error("{0}")]
    Validation(String),

    /// The upstream LLM call failed before streaming began.
    #[error("Upstream LLM error: {0}")]
    Upstream(String),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(message) => ApiError::NotFound(message),
            PortError::Unauthorized => ApiError::Unauthorized,
            PortError::Unexpected(message) => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Upstream(_) => {
                error!("Upstream failure: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to process AI request".to_string(),
                )
            }
            other => {
                error!("Internal failure: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
