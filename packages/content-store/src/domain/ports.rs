//! Repository Ports (Trait Interface)
//!
//! Port/Adapter pattern for backend flexibility:
//! - Testing & demos: InMemory
//! - Production: any adapter speaking to a real content repository

use std::sync::Arc;

use super::models::{
    Credentials, EventBatch, ListenerId, ListenerInfo, ListenerSpec, Node, Property,
    QueryLanguage, SessionId,
};
use crate::Result;

/// Content Repository Port (entry point)
pub trait ContentRepository: Send + Sync {
    /// Open an authenticated session
    ///
    /// The caller owns the session and must call `Session::logout` exactly once.
    fn login(&self, credentials: &Credentials) -> Result<Box<dyn Session>>;
}

/// Authenticated, stateful handle to the repository
///
/// All enumeration results are returned in the repository's native order.
pub trait Session: Send + Sync {
    fn id(&self) -> SessionId;

    fn user_id(&self) -> &str;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Enumeration
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn root_node(&self) -> Result<Node>;

    /// Direct children of `node`
    fn child_nodes(&self, node: &Node) -> Result<Vec<Node>>;

    /// Properties owned by `node`
    fn properties(&self, node: &Node) -> Result<Vec<Property>>;

    /// True when `node_type` is the primary type or one of the mixins of `node`
    fn is_node_type(&self, node: &Node, node_type: &str) -> Result<bool>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Query
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Execute a search statement and return matching nodes in result order
    fn execute_query(&self, statement: &str, language: QueryLanguage) -> Result<Vec<Node>>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Observation
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn add_event_listener(
        &self,
        listener: Arc<dyn EventListener>,
        spec: ListenerSpec,
    ) -> Result<ListenerId>;

    fn remove_event_listener(&self, id: ListenerId) -> Result<()>;

    /// Every listener registered with the repository, regardless of owner
    fn registered_event_listeners(&self) -> Result<Vec<ListenerInfo>>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Lifecycle
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn is_live(&self) -> bool;

    /// Release the session; later calls on it fail with `SessionClosed`
    fn logout(&self);
}

/// Callback invoked by the repository's notification thread
pub trait EventListener: Send + Sync {
    /// Name shown by listener diagnostics
    fn name(&self) -> &str {
        "anonymous"
    }

    fn on_event(&self, events: EventBatch);
}
