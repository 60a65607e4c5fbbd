//! Error types for content-store

use std::fmt;
use thiserror::Error;

/// Storage error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Login refused or session could not be opened
    Login,
    /// Read failure while enumerating nodes or properties
    Access,
    /// Malformed or failed query statement
    Query,
    /// Listener registration/removal failure
    Observation,
    /// Operation attempted on a logged-out session
    SessionClosed,
    /// Absolute path does not resolve to a node
    PathNotFound,
    /// Invalid fixture document
    Fixture,
    /// Serialization/deserialization errors
    Serialization,
    /// I/O errors
    IO,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Login => "login",
            ErrorKind::Access => "access",
            ErrorKind::Query => "query",
            ErrorKind::Observation => "observation",
            ErrorKind::SessionClosed => "session_closed",
            ErrorKind::PathNotFound => "path_not_found",
            ErrorKind::Fixture => "fixture",
            ErrorKind::Serialization => "serialization",
            ErrorKind::IO => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StorageError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn login(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Login, message)
    }

    pub fn access(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Access, message)
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Query, message)
    }

    pub fn observation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Observation, message)
    }

    pub fn session_closed(session_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::SessionClosed,
            format!("Session is logged out: {}", session_id),
        )
    }

    pub fn path_not_found(path: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::PathNotFound,
            format!("Path not found: {}", path.into()),
        )
    }

    pub fn fixture(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fixture, message)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::new(ErrorKind::Serialization, format!("JSON error: {}", err)).with_source(err)
    }
}

impl From<serde_yaml::Error> for StorageError {
    fn from(err: serde_yaml::Error) -> Self {
        StorageError::new(ErrorKind::Serialization, format!("YAML error: {}", err)).with_source(err)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::new(ErrorKind::IO, format!("IO error: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;
