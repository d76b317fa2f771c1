pub mod classify;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::connectivity::Connectivity;
use crate::events::{EventBus, SyncEvent};
use crate::models::QueueItem;
use crate::queue::QueueStore;
use crate::remote::{RemoteActionApi, RemoteError, RemoteResponse};

use classify::{classify, Verdict};

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Upper bound on a single remote call. Hitting it counts as a transient failure.
    pub request_timeout: Duration,
    /// Move items to the dead-letter table once they reach this many attempts.
    /// `None` retries forever.
    pub max_attempts: Option<i64>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub total: usize,
    pub applied: usize,
    pub dropped: usize,
    pub retained: usize,
    pub dead_lettered: usize,
    /// Items left untouched because the active user changed mid-drain.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DrainOutcome {
    AlreadyDraining,
    Offline,
    NoActiveUser,
    Empty,
    StoreUnavailable,
    Drained(DrainReport),
}

enum ItemOutcome {
    Applied,
    Dropped,
    Retained,
    DeadLettered,
}

/// Releases the draining flag on every exit path.
struct DrainGuard<'a>(&'a SyncManager);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.draining.send_replace(false);
    }
}

/// Drains the active user's queue against the remote action API.
pub struct SyncManager {
    store: QueueStore,
    connectivity: Connectivity,
    events: EventBus,
    remote: Arc<dyn RemoteActionApi>,
    current_user: watch::Sender<Option<Uuid>>,
    draining: watch::Sender<bool>,
    options: SyncOptions,
}

impl SyncManager {
    pub fn new(
        store: QueueStore,
        connectivity: Connectivity,
        events: EventBus,
        remote: Arc<dyn RemoteActionApi>,
        options: SyncOptions,
    ) -> Self {
        let (current_user, _) = watch::channel(None);
        Self {
            store,
            connectivity,
            events,
            remote,
            current_user,
            draining: watch::Sender::new(false),
            options,
        }
    }

    pub fn current_user(&self) -> Option<Uuid> {
        *self.current_user.borrow()
    }

    pub fn watch_user(&self) -> watch::Receiver<Option<Uuid>> {
        self.current_user.subscribe()
    }

    pub fn set_current_user(&self, user: Option<Uuid>) {
        let changed = self.current_user.send_if_modified(|current| {
            if *current == user {
                false
            } else {
                *current = user;
                true
            }
        });

        if changed {
            match user {
                Some(user_id) => tracing::info!(%user_id, "Active user changed"),
                None => tracing::info!("Active user cleared"),
            }
        }
    }

    pub fn is_draining(&self) -> bool {
        *self.draining.borrow()
    }

    /// Resolves once no drain pass is running.
    pub async fn wait_idle(&self) {
        let mut state = self.draining.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = state.wait_for(|draining| !*draining).await;
    }

    /// Clear every queued action, then drop the active user, so nothing queued under the old
    /// session can be replayed for the next one.
    pub async fn sign_out(&self) -> Result<u64, sqlx::Error> {
        let removed = self.store.clear().await?;
        self.set_current_user(None);
        Ok(removed)
    }

    /// Run one drain pass for the active user. Never fails: per-item errors are classified
    /// and handled inline.
    pub async fn process_queue(&self) -> DrainOutcome {
        // Check and set under the channel's lock so two callers cannot both claim the pass.
        let claimed = self.draining.send_if_modified(|draining| {
            if *draining {
                false
            } else {
                *draining = true;
                true
            }
        });
        if !claimed {
            tracing::debug!("Drain already in progress");
            return DrainOutcome::AlreadyDraining;
        }
        let _guard = DrainGuard(self);

        if !self.connectivity.is_online() {
            return DrainOutcome::Offline;
        }

        let Some(user_id) = self.current_user() else {
            return DrainOutcome::NoActiveUser;
        };

        let items = match self.store.queue_for_user(user_id).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Failed to load offline queue for {user_id}: {e}");
                return DrainOutcome::StoreUnavailable;
            }
        };

        if items.is_empty() {
            return DrainOutcome::Empty;
        }

        let total = items.len();
        let mut report = DrainReport {
            total,
            ..Default::default()
        };

        tracing::info!(%user_id, total, "Draining offline queue");
        self.events.publish(SyncEvent::SyncStart { total });

        for (index, item) in items.iter().enumerate() {
            if item.user_id != user_id || self.current_user() != Some(user_id) {
                report.skipped += 1;
            } else {
                match self.attempt(item).await {
                    ItemOutcome::Applied => report.applied += 1,
                    ItemOutcome::Dropped => report.dropped += 1,
                    ItemOutcome::Retained => report.retained += 1,
                    ItemOutcome::DeadLettered => report.dead_lettered += 1,
                }
            }

            self.events.publish(SyncEvent::SyncProgress {
                processed: index + 1,
                total,
            });
        }

        self.events.publish(SyncEvent::SyncComplete);

        tracing::info!(
            %user_id,
            applied = report.applied,
            dropped = report.dropped,
            retained = report.retained,
            dead_lettered = report.dead_lettered,
            skipped = report.skipped,
            "Offline queue drained"
        );

        DrainOutcome::Drained(report)
    }

    async fn attempt(&self, item: &QueueItem) -> ItemOutcome {
        tracing::debug!(
            "Replaying queued action {} (user={}, attempts={})",
            item.id,
            item.user_id,
            item.attempts
        );

        let result: Result<RemoteResponse, RemoteError> =
            match tokio::time::timeout(self.options.request_timeout, self.remote.apply(item)).await
            {
                Ok(result) => result,
                Err(_) => Err(RemoteError::timeout(self.options.request_timeout)),
            };

        match classify(&result) {
            Verdict::Applied => {
                if let Err(e) = self.store.remove(item.id).await {
                    tracing::warn!("Failed to remove applied action {}: {e}", item.id);
                }
                ItemOutcome::Applied
            }
            Verdict::Permanent => {
                tracing::warn!(
                    item_id = %item.id,
                    status = ?failure_status(&result),
                    "Remote rejected queued action, dropping it"
                );
                if let Err(e) = self.store.remove(item.id).await {
                    tracing::warn!("Failed to remove rejected action {}: {e}", item.id);
                }
                ItemOutcome::Dropped
            }
            Verdict::Transient => self.retain(item, &result).await,
        }
    }

    async fn retain(
        &self,
        item: &QueueItem,
        result: &Result<RemoteResponse, RemoteError>,
    ) -> ItemOutcome {
        let attempts = match self.store.increment_attempts(item.id).await {
            Ok(Some(attempts)) => attempts,
            Ok(None) => return ItemOutcome::Retained,
            Err(e) => {
                tracing::warn!("Failed to record attempt for {}: {e}", item.id);
                return ItemOutcome::Retained;
            }
        };

        tracing::debug!(item_id = %item.id, attempts, "Queued action will be retried");

        let Some(max_attempts) = self.options.max_attempts else {
            return ItemOutcome::Retained;
        };
        if attempts < max_attempts {
            return ItemOutcome::Retained;
        }

        let reason = failure_reason(result);
        match self.store.dead_letter(item.id, &reason).await {
            Ok(true) => {
                tracing::warn!(item_id = %item.id, attempts, "Queued action dead-lettered: {reason}");
                ItemOutcome::DeadLettered
            }
            Ok(false) => ItemOutcome::Retained,
            Err(e) => {
                tracing::warn!("Failed to dead-letter {}: {e}", item.id);
                ItemOutcome::Retained
            }
        }
    }
}

fn failure_status(result: &Result<RemoteResponse, RemoteError>) -> Option<u16> {
    match result {
        Ok(resp) => resp.status,
        Err(e) => e.status,
    }
}

fn failure_reason(result: &Result<RemoteResponse, RemoteError>) -> String {
    match result {
        Ok(RemoteResponse {
            status: Some(status),
            ..
        }) => format!("Remote responded with status {status}"),
        Ok(_) => "Remote reported failure".to_string(),
        Err(e) => e.to_string(),
    }
}
