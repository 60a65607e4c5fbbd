//! Observation hub - listener registry and background event dispatcher
//!
//! Committed batches travel over a channel to a single dispatcher thread,
//! which filters them per registration and invokes the listeners. A barrier
//! message lets callers wait until everything committed so far has been
//! delivered.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use tracing::{debug, error, warn};

use super::tree::parent_path;
use crate::domain::{
    ChangeEvent, EventBatch, EventListener, EventType, EventTypeMask, ListenerId, ListenerInfo,
    ListenerSpec, SessionId,
};
use crate::{Result, StorageError};

#[derive(Clone)]
struct Registration {
    id: ListenerId,
    listener: Arc<dyn EventListener>,
    spec: ListenerSpec,
    session_id: SessionId,
}

enum DispatchMessage {
    Batch(Vec<ChangeEvent>),
    Barrier(Sender<()>),
}

pub(crate) struct ObservationHub {
    registrations: Arc<Mutex<Vec<Registration>>>,
    next_id: AtomicU64,
    delivered: Arc<AtomicU64>,
    event_tx: Mutex<Option<Sender<DispatchMessage>>>,
    dispatcher_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ObservationHub {
    pub fn new() -> Self {
        let registrations = Arc::new(Mutex::new(Vec::new()));
        let delivered = Arc::new(AtomicU64::new(0));
        let (event_tx, event_rx) = channel();

        let thread_registrations = registrations.clone();
        let thread_delivered = delivered.clone();
        let dispatcher_thread = thread::Builder::new()
            .name("content-store-observation".to_string())
            .spawn(move || Self::dispatch_events(event_rx, thread_registrations, thread_delivered))
            .map_err(|e| error!("Failed to spawn observation dispatcher: {}", e))
            .ok();

        Self {
            registrations,
            next_id: AtomicU64::new(1),
            delivered,
            event_tx: Mutex::new(Some(event_tx)),
            dispatcher_thread: Mutex::new(dispatcher_thread),
        }
    }

    pub fn register(
        &self,
        listener: Arc<dyn EventListener>,
        spec: ListenerSpec,
        session_id: SessionId,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(listener = %id, name = listener.name(), path = %spec.root_path, "Registering event listener");
        self.registrations.lock().push(Registration {
            id,
            listener,
            spec,
            session_id,
        });
        id
    }

    pub fn unregister(&self, id: ListenerId) -> Result<()> {
        let mut registrations = self.registrations.lock();
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        if registrations.len() == before {
            return Err(StorageError::observation(format!(
                "Listener is not registered: {}",
                id
            )));
        }
        Ok(())
    }

    /// Drop every registration made by `session_id`; returns how many were removed
    pub fn unregister_session(&self, session_id: SessionId) -> usize {
        let mut registrations = self.registrations.lock();
        let before = registrations.len();
        registrations.retain(|r| r.session_id != session_id);
        before - registrations.len()
    }

    pub fn listeners(&self) -> Vec<ListenerInfo> {
        self.registrations
            .lock()
            .iter()
            .map(|r| ListenerInfo {
                id: r.id,
                name: r.listener.name().to_string(),
                session_id: r.session_id,
                spec: r.spec.clone(),
            })
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.registrations.lock().len()
    }

    pub fn delivered_batches(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn commit(&self, events: Vec<ChangeEvent>) {
        if events.is_empty() {
            return;
        }
        if let Some(tx) = self.event_tx.lock().as_ref() {
            if tx.send(DispatchMessage::Batch(events)).is_err() {
                warn!("Observation dispatcher is gone; batch dropped");
            }
        }
    }

    /// Block until every batch committed before this call has been delivered
    pub fn wait_for_idle(&self) {
        let (ack_tx, ack_rx) = channel();
        let sent = self
            .event_tx
            .lock()
            .as_ref()
            .map(|tx| tx.send(DispatchMessage::Barrier(ack_tx)).is_ok())
            .unwrap_or(false);
        if sent {
            let _ = ack_rx.recv();
        }
    }

    fn dispatch_events(
        event_rx: Receiver<DispatchMessage>,
        registrations: Arc<Mutex<Vec<Registration>>>,
        delivered: Arc<AtomicU64>,
    ) {
        while let Ok(message) = event_rx.recv() {
            match message {
                DispatchMessage::Batch(events) => {
                    // Snapshot so listeners may (un)register without deadlocking
                    let snapshot: Vec<Registration> = registrations.lock().clone();
                    for registration in snapshot {
                        let selected =
                            select_events(&registration.spec, registration.session_id, &events);
                        if selected.is_empty() {
                            continue;
                        }
                        let listener = registration.listener.clone();
                        let outcome = catch_unwind(AssertUnwindSafe(|| {
                            listener.on_event(EventBatch::new(selected));
                        }));
                        match outcome {
                            Ok(()) => {
                                delivered.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(_) => {
                                error!(
                                    listener = %registration.id,
                                    name = registration.listener.name(),
                                    "Event listener panicked while handling a batch"
                                );
                            }
                        }
                    }
                }
                DispatchMessage::Barrier(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        debug!("Observation dispatcher stopped");
    }
}

impl Default for ObservationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObservationHub {
    fn drop(&mut self) {
        // Closing the channel ends the dispatcher loop
        self.event_tx.lock().take();
        if let Some(handle) = self.dispatcher_thread.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// Events of `batch` visible to a registration, in commit order
fn select_events(
    spec: &ListenerSpec,
    session_id: SessionId,
    batch: &[ChangeEvent],
) -> Vec<ChangeEvent> {
    let mut selected: Vec<ChangeEvent> = batch
        .iter()
        .filter(|event| event.event_type != EventType::Persisted)
        .filter(|event| matches_spec(spec, session_id, event))
        .cloned()
        .collect();

    if selected.is_empty() {
        return selected;
    }

    if spec.event_types.contains(EventTypeMask::PERSIST) {
        selected.extend(
            batch
                .iter()
                .filter(|event| event.event_type == EventType::Persisted)
                .filter(|event| !(spec.no_local && event.session_id == session_id))
                .cloned(),
        );
    }
    selected
}

fn matches_spec(spec: &ListenerSpec, session_id: SessionId, event: &ChangeEvent) -> bool {
    if !spec.event_types.contains(event.event_type.into()) {
        return false;
    }
    if spec.no_local && event.session_id == session_id {
        return false;
    }

    let associated = parent_path(&event.path);
    let root = spec.root_path.trim_end_matches('/');
    if associated == root || (root.is_empty() && associated == "/") {
        return true;
    }
    spec.deep && (root.is_empty() || associated.starts_with(&format!("{}/", root)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: EventType, path: &str, session_id: SessionId) -> ChangeEvent {
        ChangeEvent::new(event_type, path, "admin", session_id)
    }

    #[test]
    fn test_deep_matches_subtree() {
        let session = SessionId::new();
        let spec = ListenerSpec::new("/content");
        assert!(matches_spec(&spec, session, &event(EventType::NodeAdded, "/content/a", session)));
        assert!(matches_spec(&spec, session, &event(EventType::NodeAdded, "/content/a/b/c", session)));
        assert!(!matches_spec(&spec, session, &event(EventType::NodeAdded, "/content", session)));
        assert!(!matches_spec(&spec, session, &event(EventType::NodeAdded, "/contentx/a", session)));
    }

    #[test]
    fn test_shallow_matches_direct_children_only() {
        let session = SessionId::new();
        let spec = ListenerSpec::new("/content").deep(false);
        assert!(matches_spec(&spec, session, &event(EventType::PropertyAdded, "/content/title", session)));
        assert!(!matches_spec(&spec, session, &event(EventType::NodeAdded, "/content/a/b", session)));
    }

    #[test]
    fn test_root_listener_sees_everything_when_deep() {
        let session = SessionId::new();
        let spec = ListenerSpec::new("/");
        assert!(matches_spec(&spec, session, &event(EventType::NodeAdded, "/content", session)));
        assert!(matches_spec(&spec, session, &event(EventType::NodeAdded, "/content/a/b", session)));
    }

    #[test]
    fn test_type_mask_and_no_local() {
        let own = SessionId::new();
        let other = SessionId::new();
        let spec = ListenerSpec::new("/content")
            .event_types(EventTypeMask::NODE_REMOVED)
            .no_local(true);
        assert!(!matches_spec(&spec, own, &event(EventType::NodeAdded, "/content/a", other)));
        assert!(!matches_spec(&spec, own, &event(EventType::NodeRemoved, "/content/a", own)));
        assert!(matches_spec(&spec, own, &event(EventType::NodeRemoved, "/content/a", other)));
    }

    #[test]
    fn test_persist_only_accompanies_matching_events() {
        let session = SessionId::new();
        let spec = ListenerSpec::new("/content");

        let unrelated = vec![
            event(EventType::NodeAdded, "/other/a", session),
            event(EventType::Persisted, "/", session),
        ];
        assert!(select_events(&spec, session, &unrelated).is_empty());

        let related = vec![
            event(EventType::NodeAdded, "/content/a", session),
            event(EventType::Persisted, "/", session),
        ];
        let selected = select_events(&spec, session, &related);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[1].event_type, EventType::Persisted);
    }
}
