//! In-Memory Content Repository
//!
//! Arena tree guarded by a `RwLock`, simple user table, observation hub and
//! a fault plan for exercising error paths. Suitable for tests, demos and
//! fixtures; nothing is persisted.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::observation::ObservationHub;
use super::query::ContainsQuery;
use super::tree::{child_path, parent_path, ContentTree};
use crate::domain::{
    ChangeEvent, ContentRepository, Credentials, EventListener, EventType, ListenerId,
    ListenerInfo, ListenerSpec, Node, Property, PropertyValue, QueryLanguage, Session, SessionId,
};
use crate::{Result, StorageError};

pub const DEFAULT_NODE_TYPE: &str = "nt:unstructured";

/// Injected failure, active until `clear_faults`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Every login is refused
    Login,
    /// Enumerating the children of the node at this path fails
    ChildNodes(String),
    /// Enumerating the properties of the node at this path fails
    Properties(String),
    /// Every query fails
    Query,
    /// Listener registration fails
    AddListener,
    /// Listener removal fails
    RemoveListener,
}

/// Repository counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepositoryStats {
    pub logins: u64,
    pub logouts: u64,
    pub open_sessions: u64,
    pub listeners: usize,
    pub delivered_batches: u64,
}

pub(crate) struct RepositoryInner {
    pub(crate) tree: RwLock<ContentTree>,
    users: RwLock<HashMap<String, String>>,
    faults: Mutex<Vec<Fault>>,
    hub: ObservationHub,
    logins: AtomicU64,
    logouts: AtomicU64,
}

impl RepositoryInner {
    fn has_fault(&self, fault: &Fault) -> bool {
        self.faults.lock().contains(fault)
    }
}

#[derive(Clone)]
pub struct InMemoryRepository {
    pub(crate) inner: Arc<RepositoryInner>,
}

impl InMemoryRepository {
    /// Empty repository with a single `admin`/`admin` user
    pub fn new() -> Self {
        Self::with_tree(ContentTree::new())
    }

    pub(crate) fn with_tree(tree: ContentTree) -> Self {
        let mut users = HashMap::new();
        users.insert("admin".to_string(), "admin".to_string());
        Self {
            inner: Arc::new(RepositoryInner {
                tree: RwLock::new(tree),
                users: RwLock::new(users),
                faults: Mutex::new(Vec::new()),
                hub: ObservationHub::new(),
                logins: AtomicU64::new(0),
                logouts: AtomicU64::new(0),
            }),
        }
    }

    pub fn add_user(&self, user_id: impl Into<String>, password: impl Into<String>) {
        self.inner
            .users
            .write()
            .insert(user_id.into(), password.into());
    }

    /// Login returning the concrete session, which also exposes write operations
    pub fn open_session(&self, credentials: &Credentials) -> Result<InMemorySession> {
        if self.inner.has_fault(&Fault::Login) {
            return Err(StorageError::login("Repository refused the login"));
        }
        let accepted = self
            .inner
            .users
            .read()
            .get(&credentials.user_id)
            .map(|password| password == &credentials.password)
            .unwrap_or(false);
        if !accepted {
            return Err(StorageError::login(format!(
                "Invalid credentials for user '{}'",
                credentials.user_id
            )));
        }

        self.inner.logins.fetch_add(1, Ordering::Relaxed);
        let session = InMemorySession {
            id: SessionId::new(),
            user_id: credentials.user_id.clone(),
            inner: self.inner.clone(),
            live: AtomicBool::new(true),
            pending: Mutex::new(Vec::new()),
        };
        debug!(session = %session.id, user = %session.user_id, "Session opened");
        Ok(session)
    }

    pub fn inject_fault(&self, fault: Fault) {
        self.inner.faults.lock().push(fault);
    }

    pub fn clear_faults(&self) {
        self.inner.faults.lock().clear();
    }

    /// Block until every saved batch has been delivered to listeners
    pub fn wait_for_idle(&self) {
        self.inner.hub.wait_for_idle();
    }

    pub fn stats(&self) -> RepositoryStats {
        let logins = self.inner.logins.load(Ordering::Relaxed);
        let logouts = self.inner.logouts.load(Ordering::Relaxed);
        RepositoryStats {
            logins,
            logouts,
            open_sessions: logins.saturating_sub(logouts),
            listeners: self.inner.hub.listener_count(),
            delivered_batches: self.inner.hub.delivered_batches(),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentRepository for InMemoryRepository {
    fn login(&self, credentials: &Credentials) -> Result<Box<dyn Session>> {
        Ok(Box::new(self.open_session(credentials)?))
    }
}

/// Session over an `InMemoryRepository`
///
/// Writes are applied to the tree immediately and queue change events;
/// `save` commits the queued events as one batch.
pub struct InMemorySession {
    id: SessionId,
    user_id: String,
    inner: Arc<RepositoryInner>,
    live: AtomicBool,
    pending: Mutex<Vec<ChangeEvent>>,
}

impl InMemorySession {
    fn ensure_live(&self) -> Result<()> {
        if self.live.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StorageError::session_closed(self.id))
        }
    }

    fn record(&self, event_type: EventType, path: impl Into<String>) {
        self.pending
            .lock()
            .push(ChangeEvent::new(event_type, path, &self.user_id, self.id));
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Writes
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn add_node(&self, parent_path: &str, name: &str, primary_type: &str) -> Result<Node> {
        self.ensure_live()?;
        let node = {
            let mut tree = self.inner.tree.write();
            let parent = tree.resolve_or_err(parent_path)?;
            let idx = tree.add_node(parent, name, primary_type, Vec::new())?;
            tree.view(idx)?
        };
        self.record(EventType::NodeAdded, node.path.clone());
        Ok(node)
    }

    pub fn set_property(
        &self,
        node_path: &str,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        self.ensure_live()?;
        let (existed, path) = {
            let mut tree = self.inner.tree.write();
            let idx = tree.resolve_or_err(node_path)?;
            let existed = tree.set_property(idx, name, value.into())?;
            (existed, child_path(&tree.path_of(idx)?, name))
        };
        let event_type = if existed {
            EventType::PropertyChanged
        } else {
            EventType::PropertyAdded
        };
        self.record(event_type, path);
        Ok(())
    }

    pub fn remove_property(&self, node_path: &str, name: &str) -> Result<()> {
        self.ensure_live()?;
        let path = {
            let mut tree = self.inner.tree.write();
            let idx = tree.resolve_or_err(node_path)?;
            tree.remove_property(idx, name)?;
            child_path(&tree.path_of(idx)?, name)
        };
        self.record(EventType::PropertyRemoved, path);
        Ok(())
    }

    pub fn remove_node(&self, path: &str) -> Result<()> {
        self.ensure_live()?;
        {
            let mut tree = self.inner.tree.write();
            let idx = tree.resolve_or_err(path)?;
            tree.remove_node(idx)?;
        }
        self.record(EventType::NodeRemoved, path);
        Ok(())
    }

    /// Move the node at `source_path` so that it lives at `destination_path`
    pub fn move_node(&self, source_path: &str, destination_path: &str) -> Result<()> {
        self.ensure_live()?;
        let name = destination_path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let destination = {
            let mut tree = self.inner.tree.write();
            let idx = tree.resolve_or_err(source_path)?;
            let new_parent = tree.resolve_or_err(parent_path(destination_path))?;
            tree.move_node(idx, new_parent, &name)?;
            tree.path_of(idx)?
        };
        self.record(EventType::NodeMoved, destination);
        Ok(())
    }

    /// Commit queued changes as one batch, closed by a `Persisted` event
    pub fn save(&self) -> Result<()> {
        self.ensure_live()?;
        let mut batch: Vec<ChangeEvent> = std::mem::take(&mut *self.pending.lock());
        if batch.is_empty() {
            return Ok(());
        }
        batch.push(ChangeEvent::new(
            EventType::Persisted,
            "/",
            &self.user_id,
            self.id,
        ));
        debug!(session = %self.id, events = batch.len(), "Committing change batch");
        self.inner.hub.commit(batch);
        Ok(())
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.lock().is_empty()
    }
}

impl Session for InMemorySession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn root_node(&self) -> Result<Node> {
        self.ensure_live()?;
        let tree = self.inner.tree.read();
        tree.view(tree.root())
    }

    fn child_nodes(&self, node: &Node) -> Result<Vec<Node>> {
        self.ensure_live()?;
        if self.inner.has_fault(&Fault::ChildNodes(node.path.clone())) {
            return Err(StorageError::access(format!(
                "Failed to read child nodes of {}",
                node.path
            )));
        }
        let tree = self.inner.tree.read();
        let idx = tree.index_of(node)?;
        tree.child_views(idx)
    }

    fn properties(&self, node: &Node) -> Result<Vec<Property>> {
        self.ensure_live()?;
        if self.inner.has_fault(&Fault::Properties(node.path.clone())) {
            return Err(StorageError::access(format!(
                "Failed to read properties of {}",
                node.path
            )));
        }
        let tree = self.inner.tree.read();
        let idx = tree.index_of(node)?;
        tree.property_views(idx)
    }

    fn is_node_type(&self, node: &Node, node_type: &str) -> Result<bool> {
        self.ensure_live()?;
        let tree = self.inner.tree.read();
        let idx = tree.index_of(node)?;
        tree.is_node_type(idx, node_type)
    }

    fn execute_query(&self, statement: &str, language: QueryLanguage) -> Result<Vec<Node>> {
        self.ensure_live()?;
        if self.inner.has_fault(&Fault::Query) {
            return Err(StorageError::query("Search index is unavailable"));
        }
        let query = match language {
            QueryLanguage::XPath => ContainsQuery::parse(statement)?,
        };
        let tree = self.inner.tree.read();
        let nodes = tree
            .full_text_matches(&query.term)?
            .into_iter()
            .map(|idx| tree.view(idx))
            .collect::<Result<Vec<_>>>()?;
        debug!(statement, hits = nodes.len(), "Query executed");
        Ok(nodes)
    }

    fn add_event_listener(
        &self,
        listener: Arc<dyn EventListener>,
        spec: ListenerSpec,
    ) -> Result<ListenerId> {
        self.ensure_live()?;
        if self.inner.has_fault(&Fault::AddListener) {
            return Err(StorageError::observation("Listener registration refused"));
        }
        if !spec.root_path.starts_with('/') {
            return Err(StorageError::observation(format!(
                "Listener root path must be absolute: {}",
                spec.root_path
            )));
        }
        Ok(self.inner.hub.register(listener, spec, self.id))
    }

    fn remove_event_listener(&self, id: ListenerId) -> Result<()> {
        self.ensure_live()?;
        if self.inner.has_fault(&Fault::RemoveListener) {
            return Err(StorageError::observation(format!(
                "Failed to remove {}",
                id
            )));
        }
        self.inner.hub.unregister(id)
    }

    fn registered_event_listeners(&self) -> Result<Vec<ListenerInfo>> {
        self.ensure_live()?;
        Ok(self.inner.hub.listeners())
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn logout(&self) {
        if !self.live.swap(false, Ordering::AcqRel) {
            warn!(session = %self.id, "Logout called on a session that is already closed");
            return;
        }
        let orphaned = self.inner.hub.unregister_session(self.id);
        if orphaned > 0 {
            info!(session = %self.id, orphaned, "Removed listeners left registered at logout");
        }
        if self.has_pending_changes() {
            warn!(session = %self.id, "Discarding unsaved change events at logout");
            self.pending.lock().clear();
        }
        self.inner.logouts.fetch_add(1, Ordering::Relaxed);
        debug!(session = %self.id, user = %self.user_id, "Session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventBatch, EventTypeMask};
    use crate::ErrorKind;

    fn admin() -> Credentials {
        Credentials::new("admin", "admin")
    }

    fn seeded() -> (InMemoryRepository, InMemorySession) {
        let repo = InMemoryRepository::new();
        let session = repo.open_session(&admin()).unwrap();
        session.add_node("/", "content", "hippostd:folder").unwrap();
        session.set_property("/content", "title", "Home").unwrap();
        session
            .add_node("/content", "about", DEFAULT_NODE_TYPE)
            .unwrap();
        session
            .set_property("/content/about", "body", "Welcome to MyHippo")
            .unwrap();
        session.save().unwrap();
        repo.wait_for_idle();
        (repo, session)
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(EventType, String)>>,
    }

    impl EventListener for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn on_event(&self, events: EventBatch) {
            let mut recorded = self.events.lock();
            for event in events.flatten() {
                recorded.push((event.event_type, event.path));
            }
        }
    }

    #[test]
    fn test_login_rejects_wrong_password() {
        let repo = InMemoryRepository::new();
        let err = repo
            .login(&Credentials::new("admin", "wrong"))
            .err()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::Login);
        assert_eq!(repo.stats().logins, 0);
    }

    #[test]
    fn test_login_fault() {
        let repo = InMemoryRepository::new();
        repo.inject_fault(Fault::Login);
        assert!(repo.login(&admin()).is_err());
        repo.clear_faults();
        assert!(repo.login(&admin()).is_ok());
    }

    #[test]
    fn test_enumeration_in_native_order() {
        let (_repo, session) = seeded();
        let root = session.root_node().unwrap();
        let children = session.child_nodes(&root).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].path, "/content");
        assert_eq!(children[0].depth, 1);

        let properties = session.properties(&children[0]).unwrap();
        let names: Vec<&str> = properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["jcr:primaryType", "title"]);
        assert_eq!(properties[1].path, "/content/title");
        assert_eq!(properties[1].depth, 2);
    }

    #[test]
    fn test_is_node_type_checks_primary_type() {
        let (_repo, session) = seeded();
        let root = session.root_node().unwrap();
        let content = session.child_nodes(&root).unwrap().remove(0);
        assert!(session.is_node_type(&content, "hippostd:folder").unwrap());
        assert!(!session.is_node_type(&content, "nt:unstructured").unwrap());
    }

    #[test]
    fn test_query_matches_substring_case_insensitively() {
        let (_repo, session) = seeded();
        let hits = session
            .execute_query("//*[jcr:contains(.,'*myhippo*')]", QueryLanguage::XPath)
            .unwrap();
        let paths: Vec<&str> = hits.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["/content/about"]);
    }

    #[test]
    fn test_query_fault() {
        let (repo, session) = seeded();
        repo.inject_fault(Fault::Query);
        let err = session
            .execute_query("//*[jcr:contains(.,'*home*')]", QueryLanguage::XPath)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Query);
    }

    #[test]
    fn test_logged_out_session_rejects_calls() {
        let (repo, session) = seeded();
        session.logout();
        assert!(!session.is_live());
        let err = session.root_node().unwrap_err();
        assert_eq!(err.kind, ErrorKind::SessionClosed);

        // second logout is ignored
        session.logout();
        assert_eq!(repo.stats().logouts, 1);
        assert_eq!(repo.stats().open_sessions, 0);
    }

    #[test]
    fn test_save_delivers_one_batch() {
        let (repo, writer) = seeded();
        let reader = repo.open_session(&admin()).unwrap();
        let recorder = Arc::new(Recorder::default());
        reader
            .add_event_listener(recorder.clone(), ListenerSpec::new("/content"))
            .unwrap();

        writer
            .add_node("/content", "news", DEFAULT_NODE_TYPE)
            .unwrap();
        writer
            .set_property("/content/news", "title", "News")
            .unwrap();
        writer.save().unwrap();
        repo.wait_for_idle();

        let events = recorder.events.lock().clone();
        assert_eq!(
            events,
            vec![
                (EventType::NodeAdded, "/content/news".to_string()),
                (EventType::PropertyAdded, "/content/news/title".to_string()),
                (EventType::Persisted, "/".to_string()),
            ]
        );
        assert_eq!(repo.stats().delivered_batches, 1);
    }

    #[test]
    fn test_no_local_skips_own_changes() {
        let (repo, session) = seeded();
        let recorder = Arc::new(Recorder::default());
        session
            .add_event_listener(
                recorder.clone(),
                ListenerSpec::new("/content").no_local(true),
            )
            .unwrap();

        session
            .set_property("/content", "title", "Start")
            .unwrap();
        session.save().unwrap();
        repo.wait_for_idle();
        assert!(recorder.events.lock().is_empty());
    }

    #[test]
    fn test_type_mask_filters_events() {
        let (repo, session) = seeded();
        let recorder = Arc::new(Recorder::default());
        session
            .add_event_listener(
                recorder.clone(),
                ListenerSpec::new("/content")
                    .event_types(EventTypeMask::NODE_REMOVED),
            )
            .unwrap();

        session.set_property("/content", "title", "Start").unwrap();
        session.remove_node("/content/about").unwrap();
        session.save().unwrap();
        repo.wait_for_idle();

        let events = recorder.events.lock().clone();
        assert_eq!(
            events,
            vec![(EventType::NodeRemoved, "/content/about".to_string())]
        );
    }

    #[test]
    fn test_move_reports_destination() {
        let (repo, session) = seeded();
        let recorder = Arc::new(Recorder::default());
        session
            .add_event_listener(recorder.clone(), ListenerSpec::new("/"))
            .unwrap();

        session
            .move_node("/content/about", "/content/about-us")
            .unwrap();
        session.save().unwrap();
        repo.wait_for_idle();

        let events = recorder.events.lock().clone();
        assert_eq!(events[0], (EventType::NodeMoved, "/content/about-us".to_string()));
    }

    #[test]
    fn test_listener_registry_and_logout_cleanup() {
        let (repo, session) = seeded();
        let id = session
            .add_event_listener(Arc::new(Recorder::default()), ListenerSpec::new("/content"))
            .unwrap();
        let listed = session.registered_event_listeners().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].name, "recorder");

        repo.inject_fault(Fault::RemoveListener);
        assert!(session.remove_event_listener(id).is_err());
        repo.clear_faults();

        session.logout();
        assert_eq!(repo.stats().listeners, 0);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_dispatch() {
        struct Panicker;
        impl EventListener for Panicker {
            fn on_event(&self, _events: EventBatch) {
                panic!("listener failure");
            }
        }

        let (repo, session) = seeded();
        session
            .add_event_listener(Arc::new(Panicker), ListenerSpec::new("/content"))
            .unwrap();
        let recorder = Arc::new(Recorder::default());
        session
            .add_event_listener(recorder.clone(), ListenerSpec::new("/content"))
            .unwrap();

        session.set_property("/content", "title", "One").unwrap();
        session.save().unwrap();
        session.set_property("/content", "title", "Two").unwrap();
        session.save().unwrap();
        repo.wait_for_idle();

        let changed = recorder
            .events
            .lock()
            .iter()
            .filter(|(t, _)| *t == EventType::PropertyChanged)
            .count();
        assert_eq!(changed, 2);
    }
}
