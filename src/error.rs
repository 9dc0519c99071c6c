//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;
use crate::store::StoreError;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key cannot be mapped onto a single path segment
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Namespace root is not an absolute path below the store root
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    /// Coordination-service call failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Session for a named cache could not be opened
    #[error("Failed to initialize cache '{name}': {source}")]
    Initialization {
        name: String,
        #[source]
        source: StoreError,
    },

    /// Value could not be serialized
    #[error("Failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    /// Stored payload could not be decoded into the value type
    #[error("Failed to decode payload at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Optimistic write lost against a concurrent writer
    #[error("Version conflict at {path}: expected version {expected}")]
    VersionConflict { path: String, expected: i32 },

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidKey(_) | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::VersionConflict { .. } => StatusCode::CONFLICT,
            CacheError::Store(StoreError::NoAuth(_)) => StatusCode::FORBIDDEN,
            CacheError::Store(
                StoreError::ConnectionLoss
                | StoreError::SessionExpired
                | StoreError::SessionClosed,
            )
            | CacheError::Initialization { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Store(_)
            | CacheError::InvalidNamespace(_)
            | CacheError::Encode(_)
            | CacheError::Decode { .. }
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CacheError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (CacheError::InvalidKey("a/b".into()), StatusCode::BAD_REQUEST),
            (
                CacheError::Store(StoreError::ConnectionLoss),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CacheError::Store(StoreError::NotEmpty("/c".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                CacheError::Store(StoreError::NoAuth("/c/k".into())),
                StatusCode::FORBIDDEN,
            ),
            (
                CacheError::InvalidNamespace("/".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                CacheError::VersionConflict {
                    path: "/c/k".into(),
                    expected: 1,
                },
                StatusCode::CONFLICT,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_store_error_converts() {
        let error: CacheError = StoreError::SessionExpired.into();
        assert!(matches!(error, CacheError::Store(StoreError::SessionExpired)));
    }
}
