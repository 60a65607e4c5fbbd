//! Domain layer for content-store
//!
//! # Domain Models
//!
//! - `Node`, `Property`, `Item`: read-only views sourced per operation
//! - `ChangeEvent`, `EventBatch`, `EventTypeMask`: observation payloads
//! - `ListenerSpec`, `ListenerInfo`: registration metadata
//!
//! # Port Traits
//!
//! - `ContentRepository`: session factory
//! - `Session`: enumeration, query and observation facility
//! - `EventListener`: asynchronous change callback

pub mod models;
pub mod ports;

pub use models::{
    ChangeEvent, Credentials, EventBatch, EventType, EventTypeMask, Item, ListenerId,
    ListenerInfo, ListenerSpec, Node, NodeId, Property, PropertyValue, QueryLanguage, SessionId,
};
pub use ports::{ContentRepository, EventListener, Session};
