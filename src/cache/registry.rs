//! Session Registry Module
//!
//! One coordination-service session per logical cache name, opened lazily
//! and closed together at shutdown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::cache::key::CacheKey;
use crate::cache::namespace::{normalize_namespace, NamespaceCache};
use crate::cache::watcher::{ConnectionWatcher, SessionHealth};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::store::{CoordinationClient, SessionConnector};

struct RegisteredSession {
    client: Arc<dyn CoordinationClient>,
    watcher: Arc<ConnectionWatcher>,
}

/// Point-in-time view of one registered session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub name: String,
    pub session_id: i64,
    pub health: SessionHealth,
    /// Watcher notifications received so far
    pub events_seen: u64,
    pub last_event_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct Settings {
    server_address: String,
    session_timeout: Duration,
    namespace_path: String,
}

// == Session Registry ==
/// Hands out [`NamespaceCache`]s backed by one shared session per name.
///
/// Lookup-or-create runs under a single lock, so concurrent first calls for
/// the same name open exactly one session. Sessions are never reopened by
/// the registry; recovering a dead session is the client's business.
pub struct SessionRegistry<C> {
    connector: C,
    settings: Mutex<Settings>,
    sessions: Mutex<HashMap<String, RegisteredSession>>,
}

impl<C: SessionConnector> SessionRegistry<C> {
    // == Constructor ==
    pub fn new(config: &Config, connector: C) -> Self {
        Self {
            connector,
            settings: Mutex::new(Settings {
                server_address: config.server_address.clone(),
                session_timeout: config.session_timeout(),
                namespace_path: config.namespace_path.clone(),
            }),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    // == Settings ==
    /// Server address used for sessions opened from now on.
    pub fn set_server_address(&self, address: impl Into<String>) {
        lock(&self.settings).server_address = address.into();
    }

    pub fn set_session_timeout(&self, timeout: Duration) {
        lock(&self.settings).session_timeout = timeout;
    }

    /// Namespace root used for caches acquired from now on.
    pub fn set_namespace_path(&self, path: impl Into<String>) {
        lock(&self.settings).namespace_path = path.into();
    }

    pub fn namespace_path(&self) -> String {
        lock(&self.settings).namespace_path.clone()
    }

    // == Lifecycle ==
    /// Nothing to prepare; sessions open on first use.
    pub fn initialize(&self) {}

    /// Closes every session and empties the registry.
    ///
    /// Every session is closed even if some fail; the first failure is
    /// returned. Returns the number of sessions closed.
    pub fn shutdown(&self) -> Result<usize> {
        let drained: Vec<(String, RegisteredSession)> = lock(&self.sessions).drain().collect();
        if drained.is_empty() {
            return Ok(0);
        }

        info!("Shutting down {} coordination sessions", drained.len());
        let mut first_failure = None;
        let mut closed = 0;
        for (name, session) in drained {
            match session.client.close() {
                Ok(()) => closed += 1,
                Err(error) => {
                    warn!("Failed to close session for cache '{}': {}", name, error);
                    if first_failure.is_none() {
                        first_failure = Some(CacheError::Store(error));
                    }
                }
            }
        }

        match first_failure {
            Some(error) => Err(error),
            None => Ok(closed),
        }
    }

    // == Sessions ==
    /// Returns the session for `name`, opening it on first use.
    pub fn get_or_create_session(&self, name: &str) -> Result<Arc<dyn CoordinationClient>> {
        let mut sessions = lock(&self.sessions);
        if let Some(existing) = sessions.get(name) {
            debug!("Reusing session {} for cache '{}'", existing.client.session_id(), name);
            return Ok(existing.client.clone());
        }

        info!("Cache with name '{}' does not yet exist. Creating now.", name);
        let settings = lock(&self.settings).clone();
        let watcher = Arc::new(ConnectionWatcher::new(name));
        let client = self
            .connector
            .connect(
                &settings.server_address,
                settings.session_timeout,
                watcher.clone(),
            )
            .map_err(|source| {
                warn!("Could not open session for cache '{}': {}", name, source);
                CacheError::Initialization {
                    name: name.to_string(),
                    source,
                }
            })?;

        sessions.insert(
            name.to_string(),
            RegisteredSession {
                client: client.clone(),
                watcher,
            },
        );
        Ok(client)
    }

    /// Returns a fresh cache handle for `name` on its shared session.
    ///
    /// An unusable namespace path fails before any session is opened.
    pub fn acquire_cache<K, V>(&self, name: &str) -> Result<NamespaceCache<K, V>>
    where
        K: CacheKey,
        V: Serialize + DeserializeOwned,
    {
        info!("Acquiring cache named [{}]", name);
        let namespace = normalize_namespace(&self.namespace_path())?;
        let client = self.get_or_create_session(name)?;
        NamespaceCache::new(client, &namespace)
    }

    // == Diagnostics ==
    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Names with a live session, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.sessions).keys().cloned().collect();
        names.sort();
        names
    }

    /// Health reported by the watcher of `name`'s session.
    pub fn health(&self, name: &str) -> Option<SessionHealth> {
        lock(&self.sessions)
            .get(name)
            .map(|session| session.watcher.health())
    }

    /// One report per registered session, sorted by name.
    ///
    /// Waits on the registry lock, which is held while a session is being
    /// opened, so call it off the async runtime.
    pub fn reports(&self) -> Vec<SessionReport> {
        let mut reports: Vec<SessionReport> = lock(&self.sessions)
            .iter()
            .map(|(name, session)| SessionReport {
                name: name.clone(),
                session_id: session.client.session_id(),
                health: session.watcher.health(),
                events_seen: session.watcher.events_seen(),
                last_event_at: session.watcher.last_event_at(),
            })
            .collect();
        reports.sort_by(|a, b| a.name.cmp(&b.name));
        reports
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
