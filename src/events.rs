// src/events.rs

//! Registry notification channel.
//!
//! The registry owns one [`EventBus`] for its whole lifetime. Listeners
//! attach per [`EventKind`]; emitting an event with no listeners is a
//! silent no-op. Callbacks are invoked synchronously, but never while any
//! registry lock is held, so a listener may call back into the registry.
//!
//! `destroy()` detaches every listener after the final `Destroy` event.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::types::EntrySnapshot;

/// Identifier returned by `on`/`once`, used to detach a listener.
pub type ListenerId = u64;

/// Notifications emitted by the registry.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A name was registered. `path` is the resolved source path; `package`
    /// is the original package identifier for package registrations.
    Register {
        name: String,
        path: std::path::PathBuf,
        package: Option<String>,
    },
    /// A name was unregistered; carries a snapshot of the removed entry.
    Unregister { name: String, entry: EntrySnapshot },
    /// An entry was reloaded from disk, manually or by the watch pipeline.
    Reload {
        name: String,
        path: std::path::PathBuf,
    },
    /// A scheduled reload failed; the entry keeps its last good artifact.
    ReloadFailed {
        name: String,
        path: std::path::PathBuf,
        error: String,
    },
    /// The registry was destroyed.
    Destroy,
}

/// Discriminant used for listener subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Register,
    Unregister,
    Reload,
    ReloadFailed,
    Destroy,
}

impl RegistryEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RegistryEvent::Register { .. } => EventKind::Register,
            RegistryEvent::Unregister { .. } => EventKind::Unregister,
            RegistryEvent::Reload { .. } => EventKind::Reload,
            RegistryEvent::ReloadFailed { .. } => EventKind::ReloadFailed,
            RegistryEvent::Destroy => EventKind::Destroy,
        }
    }
}

type Callback = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    once: bool,
    callback: Callback,
}

#[derive(Default)]
struct BusInner {
    next_id: ListenerId,
    listeners: HashMap<EventKind, Vec<Listener>>,
}

/// Per-kind listener registry with a lifecycle matching the registry's.
#[derive(Default)]
pub(crate) struct EventBus {
    inner: Mutex<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.attach(kind, false, Arc::new(callback))
    }

    pub fn once<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.attach(kind, true, Arc::new(callback))
    }

    fn attach(&self, kind: EventKind, once: bool, callback: Callback) -> ListenerId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        debug!(?kind, id, "attaching event listener");
        inner
            .listeners
            .entry(kind)
            .or_default()
            .push(Listener { id, once, callback });
        id
    }

    /// Detach a listener. Returns false if the id is unknown (e.g. a `once`
    /// listener that already fired).
    pub fn off(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        for listeners in inner.listeners.values_mut() {
            if let Some(pos) = listeners.iter().position(|l| l.id == id) {
                listeners.remove(pos);
                return true;
            }
        }
        false
    }

    /// Invoke all listeners attached to the event's kind.
    ///
    /// Callbacks to run are collected under the bus lock but invoked after
    /// it is released.
    pub fn emit(&self, event: &RegistryEvent) {
        let to_call: Vec<Callback> = {
            let mut inner = self.lock();
            match inner.listeners.get_mut(&event.kind()) {
                Some(listeners) => {
                    let callbacks =
                        listeners.iter().map(|l| Arc::clone(&l.callback)).collect();
                    listeners.retain(|l| !l.once);
                    callbacks
                }
                None => Vec::new(),
            }
        };

        debug!(kind = ?event.kind(), listeners = to_call.len(), "emitting event");
        for callback in to_call {
            callback(event);
        }
    }

    /// Drop every listener. Part of registry teardown.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.listeners.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
