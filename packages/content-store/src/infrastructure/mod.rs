//! Infrastructure Layer
//!
//! In-memory repository backend, its observation dispatcher and fixture loader

pub mod fixture;
pub mod memory_store;
mod observation;
pub mod query;
mod tree;

pub use fixture::{Fixture, NodeFixture, PropertyFixture};
pub use memory_store::{
    Fault, InMemoryRepository, InMemorySession, RepositoryStats, DEFAULT_NODE_TYPE,
};
pub use query::ContainsQuery;
