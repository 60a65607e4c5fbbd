//! content-store - hierarchical content repository access
//!
//! Read-only item views, sessions, full-text query and change observation
//! behind the `ContentRepository` / `Session` ports, plus an in-memory
//! backend used for tests, demos and fixtures.
//!
//! ## Usage
//!
//! ```rust
//! use content_store::{ContentRepository, Credentials, InMemoryRepository, Session};
//!
//! let repo = InMemoryRepository::from_fixture_str("nodes:\n  - name: content\n").unwrap();
//! let session = repo.login(&Credentials::new("admin", "admin")).unwrap();
//! let root = session.root_node().unwrap();
//! assert_eq!(session.child_nodes(&root).unwrap()[0].path, "/content");
//! session.logout();
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{
    ChangeEvent, ContentRepository, Credentials, EventBatch, EventListener, EventType,
    EventTypeMask, Item, ListenerId, ListenerInfo, ListenerSpec, Node, NodeId, Property,
    PropertyValue, QueryLanguage, Session, SessionId,
};

pub use infrastructure::{Fault, Fixture, InMemoryRepository, InMemorySession, RepositoryStats};
