//! In-process publish/subscribe for queue and drain lifecycle signals.
//!
//! Listeners register against an event *name* and are invoked synchronously, in
//! registration order, before [`EventBus::publish`] returns. Async consumers (the
//! indicator task, the SSE endpoint) read the same events through [`EventBus::stream`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use serde_json::json;
use tokio::sync::broadcast;

pub const QUEUE_UPDATED: &str = "offline-queue-updated";
/// Older subscribers still listen on this name; every queue update is dispatched to both.
pub const QUEUE_UPDATED_LEGACY: &str = "offlineQueueUpdated";
pub const SYNC_START: &str = "offline-sync-start";
pub const SYNC_PROGRESS: &str = "offline-sync-progress";
pub const SYNC_COMPLETE: &str = "offline-sync-complete";

const STREAM_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    QueueUpdated,
    SyncStart { total: usize },
    SyncProgress { processed: usize, total: usize },
    SyncComplete,
}

impl SyncEvent {
    /// Canonical event name.
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::QueueUpdated => QUEUE_UPDATED,
            SyncEvent::SyncStart { .. } => SYNC_START,
            SyncEvent::SyncProgress { .. } => SYNC_PROGRESS,
            SyncEvent::SyncComplete => SYNC_COMPLETE,
        }
    }

    /// Every name this event is dispatched under, canonical first.
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            SyncEvent::QueueUpdated => &[QUEUE_UPDATED, QUEUE_UPDATED_LEGACY],
            SyncEvent::SyncStart { .. } => &[SYNC_START],
            SyncEvent::SyncProgress { .. } => &[SYNC_PROGRESS],
            SyncEvent::SyncComplete => &[SYNC_COMPLETE],
        }
    }

    pub fn detail(&self) -> serde_json::Value {
        match self {
            SyncEvent::SyncStart { total } => json!({ "total": total }),
            SyncEvent::SyncProgress { processed, total } => {
                json!({ "processed": processed, "total": total })
            }
            SyncEvent::QueueUpdated | SyncEvent::SyncComplete => serde_json::Value::Null,
        }
    }
}

type Handler = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

struct Listener {
    id: u64,
    name: String,
    handler: Handler,
}

struct Inner {
    listeners: RwLock<Vec<Listener>>,
    next_id: AtomicU64,
    stream: broadcast::Sender<SyncEvent>,
}

#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        let (stream, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                listeners: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                stream,
            }),
        }
    }

    /// Register `handler` for events published under `name`. The handler stays registered
    /// until the returned [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, name: &str, handler: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.push(Listener {
            id,
            name: name.to_string(),
            handler: Arc::new(handler),
        });

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn publish(&self, event: SyncEvent) {
        for name in event.names() {
            // Snapshot so handlers may subscribe or unsubscribe without deadlocking.
            let handlers: Vec<Handler> = self
                .inner
                .listeners
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .iter()
                .filter(|l| l.name == *name)
                .map(|l| l.handler.clone())
                .collect();

            for handler in handlers {
                handler(&event);
            }
        }

        // No receivers is fine.
        let _ = self.inner.stream.send(event);
    }

    /// Async view of every published event, in canonical form.
    pub fn stream(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.stream.subscribe()
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|l| l.name == name)
            .count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes the handler"]
pub struct Subscription {
    id: u64,
    bus: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner
                .listeners
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .retain(|l| l.id != self.id);
        }
    }
}
