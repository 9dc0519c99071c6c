//! Namespace Cache Module
//!
//! Map-like cache whose entries are the direct children of one namespace
//! root node in the coordination store. Each entry's payload is the
//! serialized value.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::codec::{decode, encode};
use crate::cache::key::{child_path, CacheKey};
use crate::error::{CacheError, Result};
use crate::store::{
    Acl, CoordinationClient, CreateMode, StoreError, ANY_VERSION, PATH_SEPARATOR,
};

// == Public Constants ==
/// Namespace root used when a cache is built with a blank path.
pub const DEFAULT_CACHE_PATH: &str = "/shiro-cache";

/// Returns the canonical form of a namespace root.
///
/// Blank means [`DEFAULT_CACHE_PATH`] and trailing separators are dropped.
/// The root must be absolute, must lie below the store root and must not
/// contain empty, `.` or `..` segments.
pub fn normalize_namespace(path: &str) -> Result<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        debug!("Namespace path is blank, using {}", DEFAULT_CACHE_PATH);
        return Ok(DEFAULT_CACHE_PATH.to_string());
    }

    let relative = trimmed
        .strip_prefix(PATH_SEPARATOR)
        .ok_or_else(|| {
            CacheError::InvalidNamespace(format!("'{}' is not an absolute path", path))
        })?
        .trim_end_matches(PATH_SEPARATOR);
    if relative.is_empty() {
        return Err(CacheError::InvalidNamespace(format!(
            "'{}' is the store root",
            path
        )));
    }

    for segment in relative.split(PATH_SEPARATOR) {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\0') {
            return Err(CacheError::InvalidNamespace(format!(
                "'{}' has an invalid segment",
                path.escape_debug()
            )));
        }
    }

    Ok(format!("{}{}", PATH_SEPARATOR, relative))
}

/// Logs a store failure and turns it into a cache error.
fn store_failure(operation: &'static str, path: &str) -> impl FnOnce(StoreError) -> CacheError {
    let path = path.to_string();
    move |error| {
        warn!("{} failed for {}: {}", operation, path, error);
        CacheError::Store(error)
    }
}

// == Namespace Cache ==
/// Cache handle bound to one session and one namespace root.
///
/// Every operation is a sequence of blocking store round trips. All writes
/// and deletes are unconditional (`ANY_VERSION`) except [`replace`], so
/// concurrent writers race last-writer-wins and the "previous" values
/// returned by `put` and `remove` are best effort.
///
/// [`replace`]: NamespaceCache::replace
pub struct NamespaceCache<K, V> {
    client: Arc<dyn CoordinationClient>,
    root: String,
    _entries: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for NamespaceCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            root: self.root.clone(),
            _entries: PhantomData,
        }
    }
}

impl<K, V> fmt::Debug for NamespaceCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceCache")
            .field("session", &self.client.session_id())
            .field("root", &self.root)
            .finish()
    }
}

impl<K, V> NamespaceCache<K, V>
where
    K: CacheKey,
    V: Serialize + DeserializeOwned,
{
    // == Constructor ==
    /// Creates a cache rooted at the normalized form of `path` (see
    /// [`normalize_namespace`]). The root node is not created until the
    /// first `put`.
    pub fn new(client: Arc<dyn CoordinationClient>, path: &str) -> Result<Self> {
        let root = normalize_namespace(path)?;

        debug!(
            "Creating cache at {} on session {}",
            root,
            client.session_id()
        );
        Ok(Self {
            client,
            root,
            _entries: PhantomData,
        })
    }

    /// Namespace root path.
    pub fn namespace(&self) -> &str {
        &self.root
    }

    pub fn session_id(&self) -> i64 {
        self.client.session_id()
    }

    // == Get ==
    /// Returns the value stored for `key`, or `None` if there is no entry.
    ///
    /// A payload that does not decode into `V` is reported as
    /// [`CacheError::Decode`].
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let path = self.entry_path(key)?;
        debug!("Getting {} on session {}", path, self.session_id());

        if !self.node_exists(&path)? {
            debug!("No entry at {}", path);
            return Ok(None);
        }
        self.read_value(&path)
    }

    // == Put ==
    /// Stores `value` under `key` and returns the value it replaced.
    ///
    /// Creates the namespace root and the entry node when missing. An
    /// undecodable previous payload is overwritten and reported as `None`.
    pub fn put(&self, key: &K, value: &V) -> Result<Option<V>> {
        let path = self.entry_path(key)?;
        let payload = encode(value)?;
        debug!("Putting {} on session {}", path, self.session_id());

        self.ensure_root()?;
        if !self.node_exists(&path)? {
            debug!("Entry node {} does not exist, creating it", path);
            self.create_node(&path)?;
        }

        let previous = self.read_previous(&path)?;
        self.client
            .set_data(&path, &payload, ANY_VERSION)
            .map_err(store_failure("set_data", &path))?;

        Ok(previous)
    }

    // == Remove ==
    /// Deletes the entry for `key` and returns its value.
    ///
    /// Returns `None` without touching the store when there is no entry,
    /// and `None` when the entry vanished before the delete landed.
    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        let path = self.entry_path(key)?;
        debug!("Removing {} on session {}", path, self.session_id());

        if !self.node_exists(&path)? {
            debug!("No entry at {}, nothing to remove", path);
            return Ok(None);
        }

        let previous = self.read_previous(&path)?;
        match self.client.delete(&path, ANY_VERSION) {
            Ok(()) => Ok(previous),
            Err(StoreError::NoNode(_)) => Ok(None),
            Err(error) => Err(store_failure("delete", &path)(error)),
        }
    }

    // == Clear ==
    /// Deletes every entry and then the namespace root itself.
    ///
    /// No-op when the root does not exist. An entry created concurrently
    /// can make the final root delete fail with `NotEmpty`.
    pub fn clear(&self) -> Result<()> {
        debug!("Clearing {} on session {}", self.root, self.session_id());

        let Some(children) = self.children()? else {
            debug!("Namespace root {} does not exist, nothing to clear", self.root);
            return Ok(());
        };

        for child in children {
            let path = child_path(&self.root, &child)?;
            match self.client.delete(&path, ANY_VERSION) {
                Ok(()) | Err(StoreError::NoNode(_)) => {}
                Err(error) => return Err(store_failure("delete", &path)(error)),
            }
        }

        match self.client.delete(&self.root, ANY_VERSION) {
            Ok(()) | Err(StoreError::NoNode(_)) => Ok(()),
            Err(error) => Err(store_failure("delete", &self.root)(error)),
        }
    }

    // == Size ==
    /// Total payload bytes stored across all entries.
    ///
    /// This is not the entry count; see [`len`](Self::len) for that.
    pub fn size(&self) -> Result<usize> {
        let mut total = 0;
        for child in self.children()?.unwrap_or_default() {
            let path = child_path(&self.root, &child)?;
            let stat = self
                .client
                .exists(&path)
                .map_err(store_failure("exists", &path))?;
            total += stat.map_or(0, |stat| stat.data_length);
        }
        Ok(total)
    }

    /// Number of entries under the namespace root.
    pub fn len(&self) -> Result<usize> {
        Ok(self.children()?.map_or(0, |children| children.len()))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains_key(&self, key: &K) -> Result<bool> {
        let path = self.entry_path(key)?;
        self.node_exists(&path)
    }

    // == Keys ==
    /// Keys of all entries, in the store's child order, without duplicates.
    pub fn keys(&self) -> Result<Vec<K>> {
        let children = self.children()?.unwrap_or_default();

        let mut seen = HashSet::with_capacity(children.len());
        let mut keys = Vec::with_capacity(children.len());
        for child in &children {
            if seen.insert(child.as_str()) {
                keys.push(K::from_segment(child)?);
            }
        }
        Ok(keys)
    }

    // == Values ==
    /// Values of all entries, in the store's child order.
    ///
    /// Entries that vanish mid-enumeration, have an empty payload, or fail
    /// to decode are skipped, so the result is never longer than `keys()`.
    pub fn values(&self) -> Result<Vec<V>> {
        let children = self.children()?.unwrap_or_default();

        let mut values = Vec::with_capacity(children.len());
        for child in children {
            let path = child_path(&self.root, &child)?;
            if !self.node_exists(&path)? {
                continue;
            }
            match self.read_value(&path) {
                Ok(Some(value)) => values.push(value),
                Ok(None) => {}
                Err(CacheError::Decode { path, source }) => {
                    warn!("Skipping undecodable entry {}: {}", path, source);
                }
                Err(error) => return Err(error),
            }
        }
        Ok(values)
    }

    // == Versioned Access ==
    /// Returns the value for `key` together with its node version.
    ///
    /// The version is read before the payload, so a concurrent write can
    /// only make a later [`replace`](Self::replace) fail, never succeed
    /// against stale data.
    pub fn get_versioned(&self, key: &K) -> Result<Option<(V, i32)>> {
        let path = self.entry_path(key)?;
        let Some(stat) = self
            .client
            .exists(&path)
            .map_err(store_failure("exists", &path))?
        else {
            return Ok(None);
        };

        Ok(self
            .read_value(&path)?
            .map(|value| (value, stat.version)))
    }

    /// Overwrites the entry for `key` only if its version still equals
    /// `expected_version`. Returns the new version.
    pub fn replace(&self, key: &K, value: &V, expected_version: i32) -> Result<i32> {
        let path = self.entry_path(key)?;
        let payload = encode(value)?;
        debug!(
            "Replacing {} at version {} on session {}",
            path,
            expected_version,
            self.session_id()
        );

        match self.client.set_data(&path, &payload, expected_version) {
            Ok(stat) => Ok(stat.version),
            Err(StoreError::BadVersion { .. }) => Err(CacheError::VersionConflict {
                path,
                expected: expected_version,
            }),
            Err(error) => Err(store_failure("set_data", &path)(error)),
        }
    }

    // == Helpers ==
    fn entry_path(&self, key: &K) -> Result<String> {
        child_path(&self.root, &key.to_segment())
    }

    fn node_exists(&self, path: &str) -> Result<bool> {
        self.client
            .exists(path)
            .map(|stat| stat.is_some())
            .map_err(store_failure("exists", path))
    }

    /// Child names of the root, or `None` when the root does not exist.
    fn children(&self) -> Result<Option<Vec<String>>> {
        if !self.node_exists(&self.root)? {
            return Ok(None);
        }
        match self.client.get_children(&self.root) {
            Ok(children) => Ok(Some(children)),
            Err(StoreError::NoNode(_)) => Ok(None),
            Err(error) => Err(store_failure("get_children", &self.root)(error)),
        }
    }

    fn read_value(&self, path: &str) -> Result<Option<V>> {
        match self.client.get_data(path) {
            Ok(payload) => decode(path, &payload),
            Err(StoreError::NoNode(_)) => Ok(None),
            Err(error) => Err(store_failure("get_data", path)(error)),
        }
    }

    /// Like `read_value`, but an undecodable payload counts as absent.
    fn read_previous(&self, path: &str) -> Result<Option<V>> {
        match self.read_value(path) {
            Err(CacheError::Decode { path, source }) => {
                warn!("Previous payload at {} is undecodable: {}", path, source);
                Ok(None)
            }
            other => other,
        }
    }

    /// Creates the namespace root and any missing ancestors.
    fn ensure_root(&self) -> Result<()> {
        if self.node_exists(&self.root)? {
            return Ok(());
        }
        debug!("Namespace root {} does not exist, creating it", self.root);

        let mut prefix = String::with_capacity(self.root.len());
        for segment in self.root.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            prefix.push(PATH_SEPARATOR);
            prefix.push_str(segment);
            self.create_node(&prefix)?;
        }
        Ok(())
    }

    /// Creates an empty persistent node, treating an existing one as success.
    fn create_node(&self, path: &str) -> Result<()> {
        match self
            .client
            .create(path, &[], Acl::OpenUnsafe, CreateMode::Persistent)
        {
            Ok(_) | Err(StoreError::NodeExists(_)) => Ok(()),
            Err(error) => Err(store_failure("create", path)(error)),
        }
    }
}
