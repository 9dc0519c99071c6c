//! ZK Cache - key/value caches stored in a coordination-service namespace
//!
//! Each cache entry is a child node of a namespace root; its payload is the
//! serialized value. Sessions are opened lazily, one per cache name.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod store;

pub use api::AppState;
pub use cache::{NamespaceCache, SessionRegistry};
pub use config::Config;
pub use error::{CacheError, Result};
