/// Unified error types for the package index
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the index server
#[derive(Error, Debug)]
pub enum IndexError {
    /// Upload target already exists and overwriting is disabled
    #[error("File {filename} for project {project} already exists.")]
    FileExists { project: String, filename: String },

    /// Not found errors (only raised by the HTTP layer; backends return empty results)
    #[error("{0}")]
    NotFound(String),

    /// Authorization errors
    #[error("{0}")]
    Forbidden(String),

    /// Validation errors (malformed names, forms, digests)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller supplied a digest that does not match the uploaded bytes
    #[error("SHA256 digest mismatch: expected {expected}, computed {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Object store errors
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IndexError {
    /// HTTP status and stable error code for this error
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            IndexError::FileExists { .. } => (StatusCode::CONFLICT, "FileExists"),
            IndexError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            IndexError::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden"),
            IndexError::Validation(_) | IndexError::DigestMismatch { .. } => {
                (StatusCode::BAD_REQUEST, "InvalidRequest")
            }
            IndexError::Storage(_)
            | IndexError::ObjectStore(_)
            | IndexError::Io(_)
            | IndexError::Config(_)
            | IndexError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError")
            }
        }
    }
}

/// Convert IndexError to HTTP response
impl IntoResponse for IndexError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string() // Don't leak details
        } else {
            self.to_string()
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;
