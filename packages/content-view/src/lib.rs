//! content-view - read-oriented view over a hierarchical content repository
//!
//! - [`TreeTraversal`]: pre-order subtree enumeration that never expands
//!   synthetic aggregation nodes
//! - [`QueryExecutor`]: keyword full-text search, each hit followed by its properties
//! - [`ReportFormatter`]: one markup line per node or property
//! - [`ChangeSubscriber`]: logs committed changes under a configured root
//! - [`ReportService`] / [`ContentViewHost`]: request boundary and process lifecycle
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use content_store::InMemoryRepository;
//! use content_view::{ReportService, ViewConfig};
//!
//! let repo = InMemoryRepository::from_fixture_str(
//!     "nodes:\n  - name: content\n    properties:\n      - { name: title, value: Home }\n",
//! )
//! .unwrap();
//! let service = ReportService::new(Arc::new(repo), &ViewConfig::default());
//! let response = service.handle(Some("home"));
//! assert_eq!(response.status, 200);
//! assert!(response.body.contains(" - title (Property) - Path=\"/content/title\""));
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod query;
pub mod report;
pub mod service;
pub mod session;
pub mod subscriber;
pub mod traversal;

pub use config::{ConfigError, ViewConfig, CONFIG_ENV};
pub use error::{Result, ViewError};
pub use host::ContentViewHost;
pub use query::QueryExecutor;
pub use report::ReportFormatter;
pub use service::{ReportResponse, ReportService};
pub use session::ScopedSession;
pub use subscriber::{ChangeLogger, ChangeSubscriber, SubscriberState, SubscriberStats};
pub use traversal::{TreeTraversal, SYNTHETIC_AGGREGATION_TYPE};
