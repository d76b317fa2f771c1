use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::events::{EventBus, SyncEvent};
use crate::models::{DeadLetter, QueueItem};

/// Durable, per-user store of pending actions.
///
/// Every mutation publishes [`SyncEvent::QueueUpdated`] once the write has committed,
/// including no-op removals, so observers can always refresh their counts.
#[derive(Clone)]
pub struct QueueStore {
    pool: SqlitePool,
    events: EventBus,
}

impl QueueStore {
    pub fn new(pool: SqlitePool, events: EventBus) -> Self {
        Self { pool, events }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Persist a new action for `user_id`. Storage errors are returned to the caller so the
    /// user can be told the action was not saved.
    pub async fn enqueue(
        &self,
        user_id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<QueueItem, sqlx::Error> {
        let item = db::queue::insert(&self.pool, user_id, payload).await?;
        tracing::debug!(item_id = %item.id, %user_id, "Queued offline action");
        self.events.publish(SyncEvent::QueueUpdated);
        Ok(item)
    }

    pub async fn queue_for_user(&self, user_id: Uuid) -> Result<Vec<QueueItem>, sqlx::Error> {
        db::queue::list_by_user(&self.pool, user_id).await
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<QueueItem>, sqlx::Error> {
        db::queue::find_by_id(&self.pool, id).await
    }

    pub async fn count_for_user(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        db::queue::count_by_user(&self.pool, user_id).await
    }

    /// Idempotent: removing an unknown id succeeds and returns `false`.
    pub async fn remove(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let removed = db::queue::delete(&self.pool, id).await?;
        self.events.publish(SyncEvent::QueueUpdated);
        Ok(removed)
    }

    pub async fn remove_for_user(&self, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let removed = db::queue::delete_scoped(&self.pool, id, user_id).await?;
        self.events.publish(SyncEvent::QueueUpdated);
        Ok(removed)
    }

    /// Returns the new attempt count, or `None` when the item no longer exists.
    pub async fn increment_attempts(&self, id: Uuid) -> Result<Option<i64>, sqlx::Error> {
        let attempts = db::queue::increment_attempts(&self.pool, id).await?;
        self.events.publish(SyncEvent::QueueUpdated);
        Ok(attempts)
    }

    /// Drop every queued action for every user. Called on sign-out.
    pub async fn clear(&self) -> Result<u64, sqlx::Error> {
        let removed = db::queue::clear(&self.pool).await?;
        tracing::info!(removed, "Cleared offline queue");
        self.events.publish(SyncEvent::QueueUpdated);
        Ok(removed)
    }

    pub async fn dead_letter(&self, id: Uuid, error: &str) -> Result<bool, sqlx::Error> {
        let moved = db::dead_letters::move_from_queue(&self.pool, id, error).await?;
        self.events.publish(SyncEvent::QueueUpdated);
        Ok(moved)
    }

    pub async fn dead_letters_for_user(&self, user_id: Uuid) -> Result<Vec<DeadLetter>, sqlx::Error> {
        db::dead_letters::list_by_user(&self.pool, user_id).await
    }
}
