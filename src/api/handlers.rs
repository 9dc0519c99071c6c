//! API Handlers
//!
//! HTTP request handlers over the named caches of a [`SessionRegistry`].
//! Cache calls are blocking store round trips, so each one runs on the
//! blocking thread pool.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use tracing::debug;

use crate::cache::{NamespaceCache, SessionRegistry};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, GetResponse, HealthResponse, KeysResponse, PutRequest, PutResponse,
    RemoveResponse, SessionStatus, SizeResponse, ValuesResponse,
};
use crate::store::{MemoryConnector, MemoryEnsemble, SessionConnector};

/// Registry type served by the API: any connector behind an `Arc`.
pub type SharedRegistry = SessionRegistry<Arc<dyn SessionConnector>>;

type JsonCache = NamespaceCache<String, Value>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SharedRegistry>,
}

impl AppState {
    /// Creates a new AppState around an existing registry.
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Creates a new AppState from configuration, backed by an in-process
    /// ensemble.
    pub fn from_config(config: &Config) -> Self {
        let connector: Arc<dyn SessionConnector> =
            Arc::new(MemoryConnector::new(MemoryEnsemble::new()));
        Self::new(SessionRegistry::new(config, connector))
    }
}

/// Acquires the named cache and runs `op` on the blocking pool.
async fn with_cache<T, F>(state: &AppState, name: String, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(JsonCache) -> Result<T> + Send + 'static,
{
    let registry = state.registry.clone();
    tokio::task::spawn_blocking(move || {
        let cache: JsonCache = registry.acquire_cache(&name)?;
        op(cache)
    })
    .await
    .map_err(|e| CacheError::Internal(format!("Cache task failed: {}", e)))?
}

/// Handler for PUT /caches/:name/entries/:key
pub async fn put_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
    Json(req): Json<PutRequest>,
) -> Result<Json<PutResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let entry_key = key.clone();
    let previous =
        with_cache(&state, name, move |cache| cache.put(&entry_key, &req.value)).await?;

    Ok(Json(PutResponse::new(key, previous)))
}

/// Handler for GET /caches/:name/entries/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<GetResponse>> {
    let entry_key = key.clone();
    let value = with_cache(&state, name, move |cache| cache.get(&entry_key)).await?;

    match value {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /caches/:name/entries/:key
pub async fn remove_handler(
    State(state): State<AppState>,
    Path((name, key)): Path<(String, String)>,
) -> Result<Json<RemoveResponse>> {
    let entry_key = key.clone();
    let previous = with_cache(&state, name, move |cache| cache.remove(&entry_key)).await?;

    Ok(Json(RemoveResponse::new(key, previous)))
}

/// Handler for DELETE /caches/:name/entries
pub async fn clear_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ClearResponse>> {
    with_cache(&state, name.clone(), |cache| cache.clear()).await?;

    Ok(Json(ClearResponse::new(&name)))
}

/// Handler for GET /caches/:name/keys
pub async fn keys_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<KeysResponse>> {
    let keys = with_cache(&state, name, |cache| cache.keys()).await?;

    Ok(Json(KeysResponse { keys }))
}

/// Handler for GET /caches/:name/values
pub async fn values_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ValuesResponse>> {
    let values = with_cache(&state, name, |cache| cache.values()).await?;

    Ok(Json(ValuesResponse { values }))
}

/// Handler for GET /caches/:name/size
pub async fn size_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SizeResponse>> {
    let (size_bytes, entries) =
        with_cache(&state, name, |cache| Ok((cache.size()?, cache.len()?))).await?;

    Ok(Json(SizeResponse {
        size_bytes,
        entries,
    }))
}

/// Handler for GET /health
///
/// Reports the watcher-observed health of every open session. The registry
/// lock can be held by a session that is still connecting, so the lookup
/// runs on the blocking pool.
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let registry = state.registry.clone();
    let reports = tokio::task::spawn_blocking(move || registry.reports())
        .await
        .map_err(|e| CacheError::Internal(format!("Health task failed: {}", e)))?;

    let sessions: Vec<SessionStatus> = reports.into_iter().map(SessionStatus::from).collect();
    debug!("Health check over {} sessions", sessions.len());

    Ok(Json(HealthResponse::healthy(sessions)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SessionHealth;
    use serde_json::json;

    fn state() -> AppState {
        AppState::from_config(&Config::default())
    }

    fn path(name: &str, key: &str) -> Path<(String, String)> {
        Path((name.to_string(), key.to_string()))
    }

    #[tokio::test]
    async fn test_put_and_get_handler() {
        let state = state();

        let req = PutRequest {
            value: json!({"user": "alice"}),
        };
        let response = put_handler(State(state.clone()), path("auth", "s1"), Json(req))
            .await
            .unwrap();
        assert!(response.previous.is_none());

        let response = get_handler(State(state), path("auth", "s1")).await.unwrap();
        assert_eq!(response.value, json!({"user": "alice"}));
    }

    #[tokio::test]
    async fn test_get_missing_key_is_not_found() {
        let result = get_handler(State(state()), path("auth", "missing")).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_handler_returns_previous() {
        let state = state();
        let req = PutRequest { value: json!(7) };
        put_handler(State(state.clone()), path("auth", "k"), Json(req))
            .await
            .unwrap();

        let response = remove_handler(State(state.clone()), path("auth", "k"))
            .await
            .unwrap();
        assert_eq!(response.previous, Some(json!(7)));

        let response = remove_handler(State(state), path("auth", "k")).await.unwrap();
        assert!(response.previous.is_none());
    }

    #[tokio::test]
    async fn test_put_rejects_null_value() {
        let req = PutRequest { value: json!(null) };
        let result = put_handler(State(state()), path("auth", "k"), Json(req)).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_health_lists_sessions() {
        let state = state();
        keys_handler(State(state.clone()), Path("auth".to_string()))
            .await
            .unwrap();

        let response = health_handler(State(state)).await.unwrap();
        assert_eq!(response.status, "healthy");
        assert_eq!(response.sessions.len(), 1);
        assert_eq!(response.sessions[0].name, "auth");
        assert_eq!(response.sessions[0].health, SessionHealth::Connected);
        assert_eq!(response.sessions[0].events_seen, 1);
        assert!(response.sessions[0].last_event_at.is_some());
    }
}
