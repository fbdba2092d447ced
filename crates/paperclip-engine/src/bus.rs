//! Synchronous publish/subscribe bus over [`DomainEvent`]s.
//!
//! `emit` calls every listener registered for the event's kind, in
//! registration order, before returning. Listeners receive the bus and may
//! emit from inside a callback; nested events are dispatched depth-first.
//! A listener that errors or panics is logged and skipped.
//!
//! Every emitted event is also forwarded to a broadcast channel so
//! asynchronous consumers can follow the stream without registering a
//! callback.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, error};

use paperclip_core::error::ListenerError;
use paperclip_core::{DomainEvent, EventKind, ListenerId};

/// Callback invoked for each event of a subscribed kind.
pub type EventListener =
    Arc<dyn Fn(&DomainEvent, &EventBus) -> Result<(), ListenerError> + Send + Sync>;

const STREAM_CAPACITY: usize = 256;

type Registry = HashMap<EventKind, Vec<(ListenerId, EventListener)>>;

pub struct EventBus {
    listeners: RwLock<Registry>,
    next_id: AtomicU64,
    stream: broadcast::Sender<DomainEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (stream, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            stream,
        }
    }

    /// Register `listener` for events of `kind`.
    pub fn subscribe(&self, kind: EventKind, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(kind)
            .or_default()
            .push((id, listener));
        debug!(kind = %kind, listener = %id, "Listener subscribed");
        id
    }

    /// Remove a listener. Returns `false` if it was not subscribed to `kind`.
    pub fn unsubscribe(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        let Some(entries) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Receiver over every event emitted from now on.
    pub fn stream(&self) -> broadcast::Receiver<DomainEvent> {
        self.stream.subscribe()
    }

    /// Dispatch `event` to its listeners, then to the broadcast stream.
    pub fn emit(&self, event: DomainEvent) {
        let kind = event.kind();
        // Snapshot so listeners can subscribe or emit without deadlocking.
        let listeners: Vec<(ListenerId, EventListener)> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        debug!(event = event.event_name(), listeners = listeners.len(), "Emitting event");

        for (id, listener) in &listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(&event, self))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(event = %kind, listener = %id, error = %e, "Event listener failed");
                }
                Err(_) => {
                    error!(event = %kind, listener = %id, "Event listener panicked");
                }
            }
        }

        // No receivers is fine.
        let _ = self.stream.send(event);
    }
}
