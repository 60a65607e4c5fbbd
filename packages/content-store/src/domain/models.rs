//! Domain models: read-only item views, change events and listener metadata

use std::fmt;

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

// ═══════════════════════════════════════════════════════════════════════════
// Items
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque handle of a node inside one repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Read-only view of a node, valid for the duration of one operation
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Absolute path, `/` for the root node
    pub path: String,
    /// Number of ancestors (root = 0)
    pub depth: usize,
    pub primary_type: String,
    pub mixins: Vec<String>,
}

/// Property value
///
/// Untagged so fixtures can write plain scalars and string lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Long(i64),
    Double(f64),
    String(String),
    Strings(Vec<String>),
}

impl PropertyValue {
    /// Textual forms used by full-text matching
    pub fn text_values(&self) -> Vec<String> {
        match self {
            PropertyValue::Strings(values) => values.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Boolean(v) => write!(f, "{}", v),
            PropertyValue::Long(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::String(v) => write!(f, "{}", v),
            PropertyValue::Strings(v) => write!(f, "[{}]", v.join(", ")),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

/// Read-only view of a property
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub path: String,
    /// Owner depth + 1
    pub depth: usize,
    pub value: PropertyValue,
}

/// Either a node or a property
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Node(Node),
    Property(Property),
}

impl Item {
    pub fn name(&self) -> &str {
        match self {
            Item::Node(node) => &node.name,
            Item::Property(property) => &property.name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Item::Node(node) => &node.path,
            Item::Property(property) => &property.path,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Item::Node(node) => node.depth,
            Item::Property(property) => property.depth,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Item::Node(_))
    }
}

impl From<Node> for Item {
    fn from(node: Node) -> Self {
        Item::Node(node)
    }
}

impl From<Property> for Item {
    fn from(property: Property) -> Self {
        Item::Property(property)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Sessions & Queries
// ═══════════════════════════════════════════════════════════════════════════

/// Simple user/password credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user_id: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("password", &"***")
            .finish()
    }
}

/// Session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Query statement language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryLanguage {
    XPath,
}

// ═══════════════════════════════════════════════════════════════════════════
// Change Events
// ═══════════════════════════════════════════════════════════════════════════

/// Kind of repository mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    NodeAdded,
    NodeMoved,
    NodeRemoved,
    Persisted,
    PropertyAdded,
    PropertyChanged,
    PropertyRemoved,
}

impl EventType {
    /// Human-readable name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            EventType::NodeAdded => "NodeAdded",
            EventType::NodeMoved => "NodeMoved",
            EventType::NodeRemoved => "NodeRemoved",
            EventType::Persisted => "Persist",
            EventType::PropertyAdded => "PropertyAdded",
            EventType::PropertyChanged => "PropertyChanged",
            EventType::PropertyRemoved => "PropertyRemoved",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

bitflags! {
    /// Set of event types a listener is interested in (JCR event constants)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EventTypeMask: u32 {
        const NODE_ADDED = 0x1;
        const NODE_REMOVED = 0x2;
        const PROPERTY_ADDED = 0x4;
        const PROPERTY_REMOVED = 0x8;
        const PROPERTY_CHANGED = 0x10;
        const NODE_MOVED = 0x20;
        const PERSIST = 0x40;
    }
}

impl From<EventType> for EventTypeMask {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::NodeAdded => EventTypeMask::NODE_ADDED,
            EventType::NodeRemoved => EventTypeMask::NODE_REMOVED,
            EventType::PropertyAdded => EventTypeMask::PROPERTY_ADDED,
            EventType::PropertyRemoved => EventTypeMask::PROPERTY_REMOVED,
            EventType::PropertyChanged => EventTypeMask::PROPERTY_CHANGED,
            EventType::NodeMoved => EventTypeMask::NODE_MOVED,
            EventType::Persisted => EventTypeMask::PERSIST,
        }
    }
}

/// Same text form as the serde representation: `NODE_ADDED | PERSIST`
impl fmt::Display for EventTypeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

/// A single committed repository mutation
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub event_type: EventType,
    pub path: String,
    pub user_id: String,
    /// Session whose save produced the event
    pub session_id: SessionId,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(
        event_type: EventType,
        path: impl Into<String>,
        user_id: impl Into<String>,
        session_id: SessionId,
    ) -> Self {
        Self {
            event_type,
            path: path.into(),
            user_id: user_id.into(),
            session_id,
            timestamp: Utc::now(),
        }
    }
}

/// One delivered batch of change events, iterated in commit order
///
/// Items are fallible: reading an event out of the batch may fail.
pub struct EventBatch {
    inner: Box<dyn Iterator<Item = Result<ChangeEvent>> + Send>,
}

impl EventBatch {
    pub fn new(events: Vec<ChangeEvent>) -> Self {
        Self {
            inner: Box::new(events.into_iter().map(Ok)),
        }
    }

    pub fn from_results(results: Vec<Result<ChangeEvent>>) -> Self {
        Self {
            inner: Box::new(results.into_iter()),
        }
    }
}

impl Iterator for EventBatch {
    type Item = Result<ChangeEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl fmt::Debug for EventBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBatch").finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Listener Registrations
// ═══════════════════════════════════════════════════════════════════════════

/// Registration handle returned by `Session::add_event_listener`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Filter a listener is registered with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSpec {
    pub event_types: EventTypeMask,
    pub root_path: String,
    /// Include the whole subtree, not only direct children of `root_path`
    pub deep: bool,
    /// Skip events produced by the registering session
    pub no_local: bool,
}

impl ListenerSpec {
    pub fn new(root_path: impl Into<String>) -> Self {
        Self {
            event_types: EventTypeMask::all(),
            root_path: root_path.into(),
            deep: true,
            no_local: false,
        }
    }

    pub fn event_types(mut self, event_types: EventTypeMask) -> Self {
        self.event_types = event_types;
        self
    }

    pub fn deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    pub fn no_local(mut self, no_local: bool) -> Self {
        self.no_local = no_local;
        self
    }
}

/// Diagnostic view of a registered listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerInfo {
    pub id: ListenerId,
    pub name: String,
    pub session_id: SessionId,
    pub spec: ListenerSpec,
}

impl fmt::Display for ListenerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) path={} deep={} no_local={} types={}",
            self.id,
            self.name,
            self.spec.root_path,
            self.spec.deep,
            self.spec.no_local,
            self.spec.event_types
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        assert_eq!(EventType::NodeAdded.name(), "NodeAdded");
        assert_eq!(EventType::Persisted.name(), "Persist");
        assert_eq!(EventType::PropertyChanged.to_string(), "PropertyChanged");
    }

    #[test]
    fn test_mask_uses_jcr_event_constants() {
        assert_eq!(EventTypeMask::from(EventType::NodeAdded).bits(), 0x1);
        assert_eq!(EventTypeMask::from(EventType::NodeMoved).bits(), 0x20);
        assert_eq!(EventTypeMask::from(EventType::Persisted).bits(), 0x40);
        assert_eq!(EventTypeMask::all().bits(), 0x7f);
    }

    #[test]
    fn test_mask_contains() {
        let mask = EventTypeMask::NODE_ADDED | EventTypeMask::NODE_REMOVED;
        assert!(mask.contains(EventType::NodeAdded.into()));
        assert!(mask.contains(EventType::NodeRemoved.into()));
        assert!(!mask.contains(EventType::PropertyAdded.into()));
        assert_eq!(mask.to_string(), "NODE_ADDED | NODE_REMOVED");
    }

    #[test]
    fn test_mask_text_form_parses_back() {
        let mask = EventTypeMask::PROPERTY_CHANGED | EventTypeMask::PERSIST;
        let parsed: EventTypeMask = bitflags::parser::from_str(&mask.to_string()).unwrap();
        assert_eq!(parsed, mask);
        assert!(bitflags::parser::from_str::<EventTypeMask>("NODE_RENAMED").is_err());
    }

    #[test]
    fn test_item_accessors() {
        let item: Item = Property {
            name: "title".to_string(),
            path: "/content/title".to_string(),
            depth: 2,
            value: "Home".into(),
        }
        .into();
        assert_eq!(item.name(), "title");
        assert_eq!(item.path(), "/content/title");
        assert_eq!(item.depth(), 2);
        assert!(!item.is_node());
    }

    #[test]
    fn test_property_value_text() {
        assert_eq!(PropertyValue::Long(42).text_values(), vec!["42"]);
        assert_eq!(
            PropertyValue::Strings(vec!["a".into(), "b".into()]).text_values(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials::new("admin", "secret");
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_event_batch_preserves_order() {
        let session = SessionId::new();
        let batch = EventBatch::new(vec![
            ChangeEvent::new(EventType::NodeAdded, "/content/a", "admin", session),
            ChangeEvent::new(EventType::PropertyAdded, "/content/a/title", "admin", session),
        ]);
        let paths: Vec<String> = batch.map(|e| e.unwrap().path).collect();
        assert_eq!(paths, vec!["/content/a", "/content/a/title"]);
    }
}
