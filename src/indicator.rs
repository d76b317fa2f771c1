use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::connectivity::Connectivity;
use crate::events::{EventBus, SyncEvent};
use crate::queue::QueueStore;

/// What a pending-actions badge needs to render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndicatorState {
    pub online: bool,
    /// Queued actions for the active user.
    pub pending: i64,
    pub syncing: bool,
    pub processed: usize,
    pub total: usize,
}

#[derive(Clone)]
pub struct QueueIndicator {
    state: watch::Receiver<IndicatorState>,
}

impl QueueIndicator {
    /// Start tracking. Receivers are taken before the task is spawned so no event published
    /// after this call is missed.
    pub fn spawn(
        store: QueueStore,
        events: &EventBus,
        connectivity: &Connectivity,
        users: watch::Receiver<Option<Uuid>>,
    ) -> (Self, JoinHandle<()>) {
        let initial = IndicatorState {
            online: connectivity.is_online(),
            ..Default::default()
        };
        let (tx, rx) = watch::channel(initial);

        let events_rx = events.stream();
        let online_rx = connectivity.subscribe();
        let handle = tokio::spawn(track(store, tx, events_rx, online_rx, users));

        (Self { state: rx }, handle)
    }

    pub fn snapshot(&self) -> IndicatorState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<IndicatorState> {
        self.state.clone()
    }
}

async fn track(
    store: QueueStore,
    tx: watch::Sender<IndicatorState>,
    mut events_rx: tokio::sync::broadcast::Receiver<SyncEvent>,
    mut online_rx: watch::Receiver<bool>,
    mut users: watch::Receiver<Option<Uuid>>,
) {
    recount(&store, &tx, &users).await;

    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Ok(SyncEvent::QueueUpdated) => recount(&store, &tx, &users).await,
                Ok(SyncEvent::SyncStart { total }) => tx.send_modify(|s| {
                    s.syncing = true;
                    s.processed = 0;
                    s.total = total;
                }),
                Ok(SyncEvent::SyncProgress { processed, total }) => tx.send_modify(|s| {
                    s.processed = processed;
                    s.total = total;
                }),
                Ok(SyncEvent::SyncComplete) => {
                    tx.send_modify(|s| s.syncing = false);
                    recount(&store, &tx, &users).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Indicator lagged by {skipped} events");
                    recount(&store, &tx, &users).await;
                }
                Err(RecvError::Closed) => break,
            },
            changed = online_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let online = *online_rx.borrow_and_update();
                tx.send_modify(|s| s.online = online);
            }
            changed = users.changed() => {
                if changed.is_err() {
                    break;
                }
                recount(&store, &tx, &users).await;
            }
        }
    }
}

async fn recount(
    store: &QueueStore,
    tx: &watch::Sender<IndicatorState>,
    users: &watch::Receiver<Option<Uuid>>,
) {
    let user = *users.borrow();
    let pending = match user {
        Some(user_id) => match store.count_for_user(user_id).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("Failed to count pending actions: {e}");
                return;
            }
        },
        None => 0,
    };

    tx.send_modify(|s| s.pending = pending);
}
