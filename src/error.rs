//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror.
//!
//! Cache misses are never errors: backends return `Option::None` for them,
//! and storage faults are absorbed inside each backend. Only construction
//! failures and unsupported input reach the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the caching layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Fingerprint input has a shape the canonicalizer does not support
    #[error("Canonicalization failed: {0}")]
    Canonicalization(String),

    /// A backend could not reach a required dependency at construction
    #[error("Backend '{backend}' unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// No backend registered under the requested name
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// A value could not be converted to or from its stored form
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key not found in cache (HTTP surface only)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Shorthand for a construction-time backend failure.
    pub fn unavailable(backend: impl Into<String>, reason: impl ToString) -> Self {
        CacheError::BackendUnavailable {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_)
            | CacheError::Canonicalization(_)
            | CacheError::Serialization(_) => StatusCode::BAD_REQUEST,
            CacheError::BackendUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::UnknownBackend(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Storage Fault ==
/// Steady-state storage failure inside a backend.
///
/// Never returned from the backend contract: faults are logged and degrade
/// to a miss or a dropped write.
#[derive(Error, Debug)]
pub enum StorageFault {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Undecodable record: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Atomic replace failed: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Remote store failure: {0}")]
    Remote(String),
}

// == Result Type Alias ==
/// Convenience Result type for the caching layer.
pub type Result<T> = std::result::Result<T, CacheError>;
