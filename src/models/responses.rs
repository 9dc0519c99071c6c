//! Response DTOs for the cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::{SessionHealth, SessionReport};

/// Response body for the GET operation (GET /caches/:name/entries/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for the PUT operation (PUT /caches/:name/entries/:key)
#[derive(Debug, Clone, Serialize)]
pub struct PutResponse {
    /// The key that was written
    pub key: String,
    /// Value the write replaced, if any
    pub previous: Option<Value>,
}

impl PutResponse {
    pub fn new(key: impl Into<String>, previous: Option<Value>) -> Self {
        Self {
            key: key.into(),
            previous,
        }
    }
}

/// Response body for the DELETE operation (DELETE /caches/:name/entries/:key)
#[derive(Debug, Clone, Serialize)]
pub struct RemoveResponse {
    /// The key that was removed
    pub key: String,
    /// Value that was removed, if there was one
    pub previous: Option<Value>,
}

impl RemoveResponse {
    pub fn new(key: impl Into<String>, previous: Option<Value>) -> Self {
        Self {
            key: key.into(),
            previous,
        }
    }
}

/// Response body for the clear operation (DELETE /caches/:name/entries)
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Success message
    pub message: String,
}

impl ClearResponse {
    pub fn new(name: &str) -> Self {
        Self {
            message: format!("Cache '{}' cleared", name),
        }
    }
}

/// Response body for GET /caches/:name/keys
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub keys: Vec<String>,
}

/// Response body for GET /caches/:name/values
#[derive(Debug, Clone, Serialize)]
pub struct ValuesResponse {
    pub values: Vec<Value>,
}

/// Response body for GET /caches/:name/size
#[derive(Debug, Clone, Serialize)]
pub struct SizeResponse {
    /// Total stored payload bytes
    pub size_bytes: usize,
    /// Number of entries
    pub entries: usize,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Health of each open session, keyed by cache name
    pub sessions: Vec<SessionStatus>,
}

/// Health of one named session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub name: String,
    pub session_id: i64,
    pub health: SessionHealth,
    /// Connection notifications received so far
    pub events_seen: u64,
    /// Time of the latest notification in ISO 8601 format
    pub last_event_at: Option<String>,
}

impl From<SessionReport> for SessionStatus {
    fn from(report: SessionReport) -> Self {
        Self {
            name: report.name,
            session_id: report.session_id,
            health: report.health,
            events_seen: report.events_seen,
            last_event_at: report.last_event_at.map(|at| at.to_rfc3339()),
        }
    }
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(sessions: Vec<SessionStatus>) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            sessions,
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
