//! Change subscription
//!
//! `ChangeSubscriber` owns one dedicated session for the lifetime of its
//! subscription and registers a `ChangeLogger` with the repository's
//! observation facility. The logger runs on the repository's notification
//! thread and absorbs every failure of a batch locally.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use content_store::{
    ContentRepository, Credentials, EventBatch, EventListener, EventTypeMask, ListenerId,
    ListenerInfo, ListenerSpec,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{Result, ViewError};
use crate::session::ScopedSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Uninitialized,
    Subscribed,
    Unsubscribed,
}

impl fmt::Display for SubscriberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriberState::Uninitialized => "Uninitialized",
            SubscriberState::Subscribed => "Subscribed",
            SubscriberState::Unsubscribed => "Unsubscribed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscriberStats {
    pub batches: u64,
    pub events_logged: u64,
    pub failed_batches: u64,
}

/// Logs one line per delivered change event
#[derive(Debug, Default)]
pub struct ChangeLogger {
    batches: AtomicU64,
    events_logged: AtomicU64,
    failed_batches: AtomicU64,
}

impl ChangeLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> SubscriberStats {
        SubscriberStats {
            batches: self.batches.load(Ordering::Relaxed),
            events_logged: self.events_logged.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
        }
    }

    fn log_batch(&self, events: EventBatch) -> Result<usize> {
        let mut logged = 0;
        for event in events {
            let event = event.map_err(ViewError::callback)?;
            info!(
                timestamp = %event.timestamp.to_rfc3339(),
                path = %event.path,
                user_id = %event.user_id,
                event = %event.event_type,
                "new event"
            );
            self.events_logged.fetch_add(1, Ordering::Relaxed);
            logged += 1;
        }
        Ok(logged)
    }
}

impl EventListener for ChangeLogger {
    fn name(&self) -> &str {
        "change-logger"
    }

    fn on_event(&self, events: EventBatch) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        match catch_unwind(AssertUnwindSafe(|| self.log_batch(events))) {
            Ok(Ok(logged)) => debug!(events = logged, "Change batch processed"),
            Ok(Err(e)) => {
                self.failed_batches.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Failed to process change batch");
            }
            Err(_) => {
                self.failed_batches.fetch_add(1, Ordering::Relaxed);
                error!("Change batch processing panicked");
            }
        }
    }
}

struct Subscription {
    session: ScopedSession,
    listener_id: ListenerId,
}

struct SubscriberInner {
    state: SubscriberState,
    subscription: Option<Subscription>,
}

/// Explicitly driven subscription: `subscribe` at startup, `unsubscribe` at shutdown
pub struct ChangeSubscriber {
    repository: Arc<dyn ContentRepository>,
    credentials: Credentials,
    logger: Arc<ChangeLogger>,
    inner: Mutex<SubscriberInner>,
}

impl ChangeSubscriber {
    pub fn new(repository: Arc<dyn ContentRepository>, credentials: Credentials) -> Self {
        Self {
            repository,
            credentials,
            logger: Arc::new(ChangeLogger::new()),
            inner: Mutex::new(SubscriberInner {
                state: SubscriberState::Uninitialized,
                subscription: None,
            }),
        }
    }

    pub fn state(&self) -> SubscriberState {
        self.inner.lock().state
    }

    pub fn stats(&self) -> SubscriberStats {
        self.logger.stats()
    }

    /// Open the dedicated session and register the change logger under `root_path`
    ///
    /// On failure the error is logged, the session (if any) is released and the
    /// subscriber stays `Uninitialized`.
    pub fn subscribe(
        &self,
        root_path: &str,
        event_types: EventTypeMask,
        deep: bool,
        no_local: bool,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != SubscriberState::Uninitialized {
            warn!(state = %inner.state, "Subscribe rejected");
            return Err(ViewError::invalid_state(
                inner.state,
                SubscriberState::Subscribed,
            ));
        }

        let session = ScopedSession::login(self.repository.as_ref(), &self.credentials)
            .map_err(|e| {
                error!(error = %e, root_path, "Failed to open subscription session");
                e
            })?;

        let spec = ListenerSpec::new(root_path)
            .event_types(event_types)
            .deep(deep)
            .no_local(no_local);
        let listener: Arc<dyn EventListener> = self.logger.clone();
        let listener_id = session
            .add_event_listener(listener, spec)
            .map_err(|e| {
                error!(error = %e, root_path, "Failed to register change listener");
                ViewError::RepositoryAccess(e)
            })?;

        info!(
            listener = %listener_id,
            root_path,
            deep,
            no_local,
            event_types = %event_types,
            "Subscribed to content changes"
        );
        inner.subscription = Some(Subscription {
            session,
            listener_id,
        });
        inner.state = SubscriberState::Subscribed;
        Ok(())
    }

    /// Remove the registration, then release the session regardless of the outcome
    pub fn unsubscribe(&self) {
        let mut inner = self.inner.lock();
        if inner.state != SubscriberState::Subscribed {
            info!(state = %inner.state, "Unsubscribe ignored, no active subscription");
            return;
        }

        if let Some(Subscription {
            session,
            listener_id,
        }) = inner.subscription.take()
        {
            if let Err(e) = session.remove_event_listener(listener_id) {
                warn!(listener = %listener_id, error = %e, "Failed to remove change listener");
            }
            session.close();
        }
        inner.state = SubscriberState::Unsubscribed;
        info!("Unsubscribed from content changes");
    }

    /// Every listener registered with the repository, including other subscribers' ones
    pub fn list_active_subscriptions(&self) -> Result<Vec<ListenerInfo>> {
        let inner = self.inner.lock();
        let listeners = match &inner.subscription {
            Some(subscription) => subscription.session.registered_event_listeners(),
            None => {
                let session = ScopedSession::login(self.repository.as_ref(), &self.credentials)?;
                session.registered_event_listeners()
            }
        }
        .map_err(ViewError::RepositoryAccess)?;

        for listener in &listeners {
            info!(listener = %listener, "Active subscription");
        }
        Ok(listeners)
    }
}

impl Drop for ChangeSubscriber {
    fn drop(&mut self) {
        if self.state() == SubscriberState::Subscribed {
            warn!("Subscriber dropped while subscribed, unsubscribing");
            self.unsubscribe();
        }
    }
}
