//! API Module
//!
//! HTTP handlers and routing over the named caches.
//!
//! # Endpoints
//! - `PUT /caches/:name/entries/:key` - Store a value
//! - `GET /caches/:name/entries/:key` - Retrieve a value
//! - `DELETE /caches/:name/entries/:key` - Remove a value
//! - `DELETE /caches/:name/entries` - Clear a cache
//! - `GET /caches/:name/keys`, `/values`, `/size` - Enumerate a cache
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
