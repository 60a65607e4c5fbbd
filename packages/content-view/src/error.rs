use content_store::StorageError;
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, ViewError>;

#[derive(Error, Debug)]
pub enum ViewError {
    /// Session could not be opened
    #[error("Repository access error: {0}")]
    RepositoryAccess(#[source] StorageError),

    /// Enumeration failed mid-way
    #[error("Traversal error: {0}")]
    Traversal(#[source] StorageError),

    /// Search statement was rejected or failed
    #[error("Query error: {0}")]
    Query(#[source] StorageError),

    /// Processing of a notification batch failed
    #[error("Callback error: {0}")]
    Callback(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidState { from: String, to: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ViewError {
    pub fn callback<E: std::fmt::Display>(e: E) -> Self {
        Self::Callback(e.to_string())
    }

    pub fn invalid_state(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidState {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Underlying repository error, when there is one
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            ViewError::RepositoryAccess(e) | ViewError::Traversal(e) | ViewError::Query(e) => {
                Some(e)
            }
            _ => None,
        }
    }
}
