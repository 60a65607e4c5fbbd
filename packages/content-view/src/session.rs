//! Scoped repository session
//!
//! Logs out exactly once: either through `close` or when dropped, so every
//! early return and `?` path releases the session.

use std::ops::Deref;

use content_store::{ContentRepository, Credentials, Session};
use tracing::debug;

use crate::error::{Result, ViewError};

pub struct ScopedSession {
    session: Box<dyn Session>,
    released: bool,
}

impl ScopedSession {
    pub fn login(repository: &dyn ContentRepository, credentials: &Credentials) -> Result<Self> {
        let session = repository
            .login(credentials)
            .map_err(ViewError::RepositoryAccess)?;
        debug!(session = %session.id(), user = session.user_id(), "Session acquired");
        Ok(Self::new(session))
    }

    pub fn new(session: Box<dyn Session>) -> Self {
        Self {
            session,
            released: false,
        }
    }

    /// Release the session now instead of at scope end
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.session.logout();
        debug!(session = %self.session.id(), "Session released");
    }
}

impl Deref for ScopedSession {
    type Target = dyn Session;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        self.release();
    }
}
