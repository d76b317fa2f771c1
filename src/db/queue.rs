use chrono::Utc;
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::QueueItem;

pub async fn insert(
    pool: &SqlitePool,
    user_id: Uuid,
    payload: &serde_json::Value,
) -> Result<QueueItem, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>(
        "INSERT INTO offline_queue (id, user_id, payload, attempts, created_at)
         VALUES (?, ?, ?, 0, ?)
         RETURNING id, user_id, payload, attempts, created_at",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .bind(Json(payload))
    .bind(Utc::now())
    .fetch_one(pool)
    .await
}

/// All items owned by `user_id`, oldest first.
pub async fn list_by_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>(
        "SELECT id, user_id, payload, attempts, created_at FROM offline_queue
         WHERE user_id = ?
         ORDER BY seq ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<QueueItem>, sqlx::Error> {
    sqlx::query_as::<_, QueueItem>(
        "SELECT id, user_id, payload, attempts, created_at FROM offline_queue WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn count_by_user(pool: &SqlitePool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM offline_queue WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

/// Returns whether a row was actually deleted.
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM offline_queue WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_scoped(pool: &SqlitePool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM offline_queue WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Bump the attempt counter in place. Returns the new count, or `None` if the item is gone.
pub async fn increment_attempts(pool: &SqlitePool, id: Uuid) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "UPDATE offline_queue SET attempts = attempts + 1 WHERE id = ? RETURNING attempts",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn clear(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM offline_queue").execute(pool).await?;
    Ok(result.rows_affected())
}
