//! API Routes
//!
//! Configures the Axum router with all cache endpoints.

use axum::{
    routing::{delete, get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, get_handler, health_handler, keys_handler, put_handler, remove_handler,
    size_handler, values_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /caches/:name/entries/:key` - Store a value, returning the previous one
/// - `GET /caches/:name/entries/:key` - Retrieve a value
/// - `DELETE /caches/:name/entries/:key` - Remove a value
/// - `DELETE /caches/:name/entries` - Clear the cache namespace
/// - `GET /caches/:name/keys` - List keys
/// - `GET /caches/:name/values` - List values
/// - `GET /caches/:name/size` - Stored bytes and entry count
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/caches/:name/entries/:key",
            put(put_handler).get(get_handler).delete(remove_handler),
        )
        .route("/caches/:name/entries", delete(clear_handler))
        .route("/caches/:name/keys", get(keys_handler))
        .route("/caches/:name/values", get(values_handler))
        .route("/caches/:name/size", get(size_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
