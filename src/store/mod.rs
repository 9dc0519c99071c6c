//! Coordination Store Module
//!
//! Client contract of the hierarchical coordination service the cache is
//! projected onto, plus an in-process implementation of that contract.

mod events;
pub mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use events::{EventType, KeeperState, WatchedEvent, Watcher};
pub use memory::{MemoryConnector, MemoryEnsemble, MemorySession, StoreOp};

// == Public Constants ==
/// Version argument meaning "ignore the current version".
pub const ANY_VERSION: i32 = -1;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

// == Store Error ==
/// Failures reported by a coordination-service client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("No node for path {0}")]
    NoNode(String),

    #[error("Node already exists: {0}")]
    NodeExists(String),

    #[error("Node has children: {0}")]
    NotEmpty(String),

    #[error("Not authorized to modify {0}")]
    NoAuth(String),

    #[error("Version mismatch for {path}: expected {expected}, found {actual}")]
    BadVersion {
        path: String,
        expected: i32,
        actual: i32,
    },

    #[error("Connection lost")]
    ConnectionLoss,

    #[error("Session expired")]
    SessionExpired,

    #[error("Session closed")]
    SessionClosed,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    #[error("Invalid session timeout: {0:?}")]
    InvalidTimeout(Duration),
}

// == Node Metadata ==
/// Metadata returned by existence checks and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStat {
    /// Data version, incremented on every successful write
    pub version: i32,
    /// Length of the stored payload in bytes
    pub data_length: usize,
    pub num_children: usize,
    pub ctime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
}

/// Access control attached to created nodes.
///
/// A read-only node refuses `set_data`, `delete` and the creation of
/// children with [`StoreError::NoAuth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Acl {
    /// World-readable and world-writable
    #[default]
    OpenUnsafe,
    /// Readable by anyone, writable by nobody
    ReadOnly,
}

/// Lifetime of a created node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateMode {
    /// Survives the session that created it
    #[default]
    Persistent,
    /// Removed when the creating session ends
    Ephemeral,
}

// == Client Contract ==
/// One live session against the coordination service.
///
/// Every call is a blocking round trip. Implementations must be safe to
/// share between caller threads.
pub trait CoordinationClient: Send + Sync + fmt::Debug {
    fn session_id(&self) -> i64;

    /// Returns the node metadata, or `None` if nothing exists at `path`.
    fn exists(&self, path: &str) -> Result<Option<NodeStat>, StoreError>;

    /// Creates a node. The parent must already exist.
    fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: Acl,
        mode: CreateMode,
    ) -> Result<String, StoreError>;

    fn get_data(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Overwrites the payload. `ANY_VERSION` skips the version check.
    fn set_data(&self, path: &str, data: &[u8], version: i32) -> Result<NodeStat, StoreError>;

    /// Deletes a childless node. `ANY_VERSION` skips the version check.
    fn delete(&self, path: &str, version: i32) -> Result<(), StoreError>;

    /// Child names in creation order.
    fn get_children(&self, path: &str) -> Result<Vec<String>, StoreError>;

    fn close(&self) -> Result<(), StoreError>;
}

/// Opens sessions. The registry owns one of these.
pub trait SessionConnector: Send + Sync {
    fn connect(
        &self,
        server_address: &str,
        session_timeout: Duration,
        watcher: Arc<dyn Watcher>,
    ) -> Result<Arc<dyn CoordinationClient>, StoreError>;
}

impl<T: SessionConnector + ?Sized> SessionConnector for Arc<T> {
    fn connect(
        &self,
        server_address: &str,
        session_timeout: Duration,
        watcher: Arc<dyn Watcher>,
    ) -> Result<Arc<dyn CoordinationClient>, StoreError> {
        (**self).connect(server_address, session_timeout, watcher)
    }
}

// == Address Validation ==
/// Checks a `host:port[,host:port...]` connect string.
pub fn validate_server_address(address: &str) -> Result<(), StoreError> {
    let invalid = || StoreError::InvalidAddress(address.to_string());

    if address.trim().is_empty() {
        return Err(invalid());
    }

    for server in address.split(',') {
        let (host, port) = server.trim().rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(invalid());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_single_server() {
        assert!(validate_server_address("localhost:2181").is_ok());
    }

    #[test]
    fn test_validate_server_list() {
        assert!(validate_server_address("zk1:2181, zk2:2181,zk3:2182").is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed() {
        for address in ["", "   ", "localhost", ":2181", "localhost:port", "a:1,"] {
            assert!(
                matches!(
                    validate_server_address(address),
                    Err(StoreError::InvalidAddress(_))
                ),
                "{address:?} should be rejected"
            );
        }
    }
}
