//! Cache Module
//!
//! Map-like caches projected onto coordination-store namespaces, plus the
//! registry that owns their sessions.

mod codec;
mod key;
mod namespace;
mod registry;
mod watcher;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use codec::{decode, encode};
pub use key::{child_path, validate_segment, CacheKey};
pub use namespace::{normalize_namespace, NamespaceCache, DEFAULT_CACHE_PATH};
pub use registry::{SessionRegistry, SessionReport};
pub use watcher::{ConnectionWatcher, SessionHealth};
