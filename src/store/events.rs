//! Watch Events Module
//!
//! Session and node notifications pushed by a coordination-service client.

use std::fmt;

// == Keeper State ==
/// Connection state of a session at the time an event was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeeperState {
    /// Session is established and the client is talking to a server
    SyncConnected,
    /// Client lost its connection; the session may still be alive
    Disconnected,
    /// Server declared the session dead
    Expired,
    /// Authentication was rejected
    AuthFailed,
    /// Client closed the session
    Closed,
}

// == Event Type ==
/// What happened. `None` is used for pure connection-state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    None,
    NodeCreated,
    NodeDeleted,
    NodeDataChanged,
    NodeChildrenChanged,
}

// == Watched Event ==
/// A single notification delivered to a [`Watcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent {
    pub event_type: EventType,
    pub state: KeeperState,
    /// Node the event refers to, absent for connection-state events
    pub path: Option<String>,
}

impl WatchedEvent {
    /// Creates a connection-state event with no node path.
    pub fn state_change(state: KeeperState) -> Self {
        Self {
            event_type: EventType::None,
            state,
            path: None,
        }
    }

    /// Creates a node event observed while connected.
    pub fn node(event_type: EventType, path: impl Into<String>) -> Self {
        Self {
            event_type,
            state: KeeperState::SyncConnected,
            path: Some(path.into()),
        }
    }
}

impl fmt::Display for WatchedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WatchedEvent state:{:?} type:{:?} path:{}",
            self.state,
            self.event_type,
            self.path.as_deref().unwrap_or("null")
        )
    }
}

// == Watcher ==
/// Callback attached to a session.
///
/// Invoked from the client's delivery context, never from the caller's
/// thread, so implementations must not block.
pub trait Watcher: Send + Sync {
    fn process(&self, event: WatchedEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_change_has_no_path() {
        let event = WatchedEvent::state_change(KeeperState::Expired);
        assert_eq!(event.event_type, EventType::None);
        assert!(event.path.is_none());
    }

    #[test]
    fn test_display_includes_state_and_path() {
        let event = WatchedEvent::node(EventType::NodeDeleted, "/shiro-cache/a");
        let rendered = event.to_string();
        assert!(rendered.contains("SyncConnected"));
        assert!(rendered.contains("NodeDeleted"));
        assert!(rendered.contains("/shiro-cache/a"));
    }
}
