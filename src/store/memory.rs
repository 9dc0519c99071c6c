//! In-Memory Coordination Store
//!
//! A single-process node tree that honors the [`CoordinationClient`]
//! contract: parent-must-exist creation, non-empty delete refusal, per-node
//! versions, session states and watcher notifications.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{
    validate_server_address, Acl, CoordinationClient, CreateMode, KeeperState, NodeStat,
    SessionConnector, StoreError, WatchedEvent, Watcher, ANY_VERSION, PATH_SEPARATOR,
};

const ROOT_PATH: &str = "/";

// == Node ==
#[derive(Debug, Clone)]
struct Node {
    data: Vec<u8>,
    version: i32,
    /// Child names in creation order
    children: Vec<String>,
    ctime: DateTime<Utc>,
    mtime: DateTime<Utc>,
    acl: Acl,
    ephemeral_owner: Option<i64>,
}

impl Node {
    fn new(data: &[u8], acl: Acl, ephemeral_owner: Option<i64>) -> Self {
        let now = Utc::now();
        Self {
            data: data.to_vec(),
            version: 0,
            children: Vec::new(),
            ctime: now,
            mtime: now,
            acl,
            ephemeral_owner,
        }
    }

    fn stat(&self) -> NodeStat {
        NodeStat {
            version: self.version,
            data_length: self.data.len(),
            num_children: self.children.len(),
            ctime: self.ctime,
            mtime: self.mtime,
        }
    }
}

/// Store calls an injected failure can be aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Exists,
    Create,
    GetData,
    SetData,
    Delete,
    GetChildren,
}

/// A failure armed for the next matching call.
struct InjectedFailure {
    op: Option<StoreOp>,
    path: Option<String>,
    error: StoreError,
}

impl InjectedFailure {
    fn matches(&self, op: StoreOp, path: &str) -> bool {
        self.op.map_or(true, |target| target == op)
            && self.path.as_deref().map_or(true, |target| target == path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStatus {
    Connected,
    Disconnected,
    Expired,
    Closed,
}

struct SessionEntry {
    status: SessionStatus,
    watcher: Arc<dyn Watcher>,
}

struct EnsembleState {
    nodes: BTreeMap<String, Node>,
    sessions: HashMap<i64, SessionEntry>,
    next_session_id: i64,
    pending_failure: Option<InjectedFailure>,
}

type Delivery = Vec<(Arc<dyn Watcher>, WatchedEvent)>;

// == Memory Ensemble ==
/// Shared node tree standing in for a coordination-service ensemble.
///
/// Cloning yields another handle to the same tree.
#[derive(Clone)]
pub struct MemoryEnsemble {
    state: Arc<Mutex<EnsembleState>>,
}

impl fmt::Debug for MemoryEnsemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryEnsemble")
            .field("nodes", &state.nodes.len())
            .field("sessions", &state.sessions.len())
            .finish()
    }
}

impl Default for MemoryEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEnsemble {
    /// Creates an ensemble holding only the root node.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(ROOT_PATH.to_string(), Node::new(&[], Acl::OpenUnsafe, None));

        Self {
            state: Arc::new(Mutex::new(EnsembleState {
                nodes,
                sessions: HashMap::new(),
                next_session_id: 1,
                pending_failure: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EnsembleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // == Test Hooks ==
    /// Makes the next store call on any session fail with `error`.
    pub fn inject_failure(&self, error: StoreError) {
        self.lock().pending_failure = Some(InjectedFailure {
            op: None,
            path: None,
            error,
        });
    }

    /// Makes the next `op` call on `path` fail with `error`. Other calls
    /// run normally until that one is reached.
    pub fn inject_failure_on(&self, op: StoreOp, path: impl Into<String>, error: StoreError) {
        self.lock().pending_failure = Some(InjectedFailure {
            op: Some(op),
            path: Some(path.into()),
            error,
        });
    }

    /// Declares a session dead and notifies its watcher.
    pub fn expire_session(&self, session_id: i64) {
        let delivery = {
            let mut state = self.lock();
            end_session(&mut state, session_id, SessionStatus::Expired)
        };
        deliver(delivery);
    }

    /// Drops the connection of every connected session.
    pub fn disconnect_all(&self) {
        self.transition_all(SessionStatus::Connected, SessionStatus::Disconnected);
    }

    /// Restores the connection of every disconnected session.
    pub fn reconnect_all(&self) {
        self.transition_all(SessionStatus::Disconnected, SessionStatus::Connected);
    }

    /// Number of nodes in the tree, root included.
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }

    /// Number of sessions that have not been closed.
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    fn transition_all(&self, from: SessionStatus, to: SessionStatus) {
        let keeper_state = match to {
            SessionStatus::Connected => KeeperState::SyncConnected,
            _ => KeeperState::Disconnected,
        };

        let delivery: Delivery = {
            let mut state = self.lock();
            state
                .sessions
                .values_mut()
                .filter(|entry| entry.status == from)
                .map(|entry| {
                    entry.status = to;
                    (
                        entry.watcher.clone(),
                        WatchedEvent::state_change(keeper_state),
                    )
                })
                .collect()
        };
        deliver(delivery);
    }

    fn open_session(&self, watcher: Arc<dyn Watcher>) -> i64 {
        let id = {
            let mut state = self.lock();
            let id = state.next_session_id;
            state.next_session_id += 1;
            state.sessions.insert(
                id,
                SessionEntry {
                    status: SessionStatus::Connected,
                    watcher: watcher.clone(),
                },
            );
            id
        };
        watcher.process(WatchedEvent::state_change(KeeperState::SyncConnected));
        id
    }

    /// Runs `call` after checking that the session may issue `op` on `path`.
    fn with_session<T>(
        &self,
        session_id: i64,
        op: StoreOp,
        path: &str,
        call: impl FnOnce(&mut EnsembleState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.lock();

        match state.sessions.get(&session_id).map(|entry| entry.status) {
            Some(SessionStatus::Connected) => {}
            Some(SessionStatus::Disconnected) => return Err(StoreError::ConnectionLoss),
            Some(SessionStatus::Expired) => return Err(StoreError::SessionExpired),
            Some(SessionStatus::Closed) | None => return Err(StoreError::SessionClosed),
        }

        match state.pending_failure.take() {
            Some(failure) if failure.matches(op, path) => return Err(failure.error),
            other => state.pending_failure = other,
        }

        call(&mut *state)
    }
}

/// Marks a session finished, drops its ephemeral nodes and returns the
/// notification to deliver once the lock is released.
///
/// A closed session is forgotten entirely; later calls on it see
/// `SessionClosed`.
fn end_session(state: &mut EnsembleState, session_id: i64, status: SessionStatus) -> Delivery {
    let watcher = match state.sessions.get_mut(&session_id) {
        Some(entry) if entry.status != status => {
            entry.status = status;
            entry.watcher.clone()
        }
        _ => return Vec::new(),
    };
    if status == SessionStatus::Closed {
        state.sessions.remove(&session_id);
    }

    let owned: Vec<String> = state
        .nodes
        .iter()
        .filter(|(_, node)| node.ephemeral_owner == Some(session_id))
        .map(|(path, _)| path.clone())
        .collect();
    for path in owned {
        remove_node(state, &path);
    }

    let keeper_state = match status {
        SessionStatus::Expired => KeeperState::Expired,
        _ => KeeperState::Closed,
    };
    vec![(watcher, WatchedEvent::state_change(keeper_state))]
}

fn deliver(delivery: Delivery) {
    for (watcher, event) in delivery {
        watcher.process(event);
    }
}

// == Path Helpers ==
fn validate_path(path: &str) -> Result<(), StoreError> {
    let invalid = || StoreError::InvalidPath(path.to_string());

    if path == ROOT_PATH {
        return Ok(());
    }
    let rest = path.strip_prefix(PATH_SEPARATOR).ok_or_else(invalid)?;
    for segment in rest.split(PATH_SEPARATOR) {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\0') {
            return Err(invalid());
        }
    }
    Ok(())
}

/// Splits a validated non-root path into parent path and child name.
fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once(PATH_SEPARATOR) {
        Some(("", name)) => (ROOT_PATH, name),
        Some((parent, name)) => (parent, name),
        None => (ROOT_PATH, path),
    }
}

fn remove_node(state: &mut EnsembleState, path: &str) {
    if state.nodes.remove(path).is_some() {
        let (parent, name) = split_parent(path);
        if let Some(parent) = state.nodes.get_mut(parent) {
            parent.children.retain(|child| child != name);
        }
    }
}

fn check_writable(path: &str, node: &Node) -> Result<(), StoreError> {
    match node.acl {
        Acl::OpenUnsafe => Ok(()),
        Acl::ReadOnly => Err(StoreError::NoAuth(path.to_string())),
    }
}

fn check_version(path: &str, node: &Node, expected: i32) -> Result<(), StoreError> {
    if expected != ANY_VERSION && expected != node.version {
        return Err(StoreError::BadVersion {
            path: path.to_string(),
            expected,
            actual: node.version,
        });
    }
    Ok(())
}

// == Memory Session ==
/// A session handle onto a [`MemoryEnsemble`].
#[derive(Debug)]
pub struct MemorySession {
    id: i64,
    ensemble: MemoryEnsemble,
}

impl CoordinationClient for MemorySession {
    fn session_id(&self) -> i64 {
        self.id
    }

    fn exists(&self, path: &str) -> Result<Option<NodeStat>, StoreError> {
        validate_path(path)?;
        self.ensemble.with_session(self.id, StoreOp::Exists, path, |state| {
            Ok(state.nodes.get(path).map(Node::stat))
        })
    }

    fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: Acl,
        mode: CreateMode,
    ) -> Result<String, StoreError> {
        validate_path(path)?;
        if path == ROOT_PATH {
            return Err(StoreError::NodeExists(path.to_string()));
        }

        let id = self.id;
        self.ensemble.with_session(id, StoreOp::Create, path, |state| {
            if state.nodes.contains_key(path) {
                return Err(StoreError::NodeExists(path.to_string()));
            }

            let (parent_path, name) = split_parent(path);
            let parent = state
                .nodes
                .get_mut(parent_path)
                .ok_or_else(|| StoreError::NoNode(parent_path.to_string()))?;
            if parent.ephemeral_owner.is_some() {
                return Err(StoreError::InvalidPath(format!(
                    "{path}: ephemeral parent cannot have children"
                )));
            }
            check_writable(parent_path, parent)?;
            parent.children.push(name.to_string());

            let owner = match mode {
                CreateMode::Persistent => None,
                CreateMode::Ephemeral => Some(id),
            };
            state
                .nodes
                .insert(path.to_string(), Node::new(data, acl, owner));
            debug!("Created node {} ({:?}, {:?})", path, acl, mode);
            Ok(path.to_string())
        })
    }

    fn get_data(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        validate_path(path)?;
        self.ensemble.with_session(self.id, StoreOp::GetData, path, |state| {
            state
                .nodes
                .get(path)
                .map(|node| node.data.clone())
                .ok_or_else(|| StoreError::NoNode(path.to_string()))
        })
    }

    fn set_data(&self, path: &str, data: &[u8], version: i32) -> Result<NodeStat, StoreError> {
        validate_path(path)?;
        self.ensemble.with_session(self.id, StoreOp::SetData, path, |state| {
            let node = state
                .nodes
                .get_mut(path)
                .ok_or_else(|| StoreError::NoNode(path.to_string()))?;
            check_writable(path, node)?;
            check_version(path, node, version)?;

            node.data = data.to_vec();
            node.version += 1;
            node.mtime = Utc::now();
            Ok(node.stat())
        })
    }

    fn delete(&self, path: &str, version: i32) -> Result<(), StoreError> {
        validate_path(path)?;
        if path == ROOT_PATH {
            return Err(StoreError::InvalidPath(path.to_string()));
        }

        self.ensemble.with_session(self.id, StoreOp::Delete, path, |state| {
            let node = state
                .nodes
                .get(path)
                .ok_or_else(|| StoreError::NoNode(path.to_string()))?;
            check_writable(path, node)?;
            check_version(path, node, version)?;
            if !node.children.is_empty() {
                return Err(StoreError::NotEmpty(path.to_string()));
            }

            remove_node(state, path);
            Ok(())
        })
    }

    fn get_children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        validate_path(path)?;
        self.ensemble.with_session(self.id, StoreOp::GetChildren, path, |state| {
            state
                .nodes
                .get(path)
                .map(|node| node.children.clone())
                .ok_or_else(|| StoreError::NoNode(path.to_string()))
        })
    }

    fn close(&self) -> Result<(), StoreError> {
        let delivery = {
            let mut state = self.ensemble.lock();
            end_session(&mut state, self.id, SessionStatus::Closed)
        };
        deliver(delivery);
        Ok(())
    }
}

// == Memory Connector ==
/// Opens [`MemorySession`]s and counts how many were opened.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    ensemble: MemoryEnsemble,
    connections: AtomicUsize,
}

impl MemoryConnector {
    pub fn new(ensemble: MemoryEnsemble) -> Self {
        Self {
            ensemble,
            connections: AtomicUsize::new(0),
        }
    }

    pub fn ensemble(&self) -> &MemoryEnsemble {
        &self.ensemble
    }

    /// Total number of sessions opened so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl SessionConnector for MemoryConnector {
    fn connect(
        &self,
        server_address: &str,
        session_timeout: Duration,
        watcher: Arc<dyn Watcher>,
    ) -> Result<Arc<dyn CoordinationClient>, StoreError> {
        validate_server_address(server_address)?;
        if session_timeout.is_zero() {
            return Err(StoreError::InvalidTimeout(session_timeout));
        }

        let id = self.ensemble.open_session(watcher);
        self.connections.fetch_add(1, Ordering::SeqCst);
        debug!("Opened in-memory session {} for {}", id, server_address);

        Ok(Arc::new(MemorySession {
            id,
            ensemble: self.ensemble.clone(),
        }))
    }
}
