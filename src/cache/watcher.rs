//! Connection Watcher Module
//!
//! Observes session lifecycle notifications for diagnostics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::store::{EventType, KeeperState, WatchedEvent, Watcher};

// == Session Health ==
/// Last known health of the session a watcher is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionHealth {
    /// No event received yet
    Connecting,
    Connected,
    /// Connection dropped; the session may still recover
    Suspended,
    Expired,
    Closed,
}

impl SessionHealth {
    fn after(self, state: KeeperState) -> Self {
        match (self, state) {
            // Terminal states stay put
            (SessionHealth::Expired | SessionHealth::Closed, _) => self,
            (_, KeeperState::SyncConnected) => SessionHealth::Connected,
            (_, KeeperState::Disconnected) => SessionHealth::Suspended,
            (_, KeeperState::Expired) => SessionHealth::Expired,
            (_, KeeperState::Closed) => SessionHealth::Closed,
            (_, KeeperState::AuthFailed) => self,
        }
    }
}

#[derive(Debug)]
struct Observed {
    health: SessionHealth,
    last_event_at: Option<DateTime<Utc>>,
}

// == Connection Watcher ==
/// Passive watcher attached to every registry session.
///
/// Logs each event and tracks session health. It never retries, reconnects
/// or touches cache data.
#[derive(Debug)]
pub struct ConnectionWatcher {
    name: String,
    observed: Mutex<Observed>,
    events: AtomicU64,
}

impl ConnectionWatcher {
    /// Creates a watcher for the named cache.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            observed: Mutex::new(Observed {
                health: SessionHealth::Connecting,
                last_event_at: None,
            }),
            events: AtomicU64::new(0),
        }
    }

    pub fn health(&self) -> SessionHealth {
        self.observed
            .lock()
            .map(|observed| observed.health)
            .unwrap_or_else(|poisoned| poisoned.into_inner().health)
    }

    /// Number of events received so far.
    pub fn events_seen(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.observed
            .lock()
            .map(|observed| observed.last_event_at)
            .unwrap_or_else(|poisoned| poisoned.into_inner().last_event_at)
    }
}

impl Watcher for ConnectionWatcher {
    fn process(&self, event: WatchedEvent) {
        info!("Coordination event for cache '{}': {}", self.name, event);
        self.events.fetch_add(1, Ordering::Relaxed);

        let mut observed = self
            .observed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        observed.last_event_at = Some(Utc::now());

        if event.event_type != EventType::None {
            return;
        }

        let next = observed.health.after(event.state);
        if next != observed.health {
            match next {
                SessionHealth::Suspended | SessionHealth::Expired => warn!(
                    "Session for cache '{}' is now {:?}",
                    self.name, next
                ),
                _ => info!("Session for cache '{}' is now {:?}", self.name, next),
            }
            observed.health = next;
        }
    }
}
