use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::DeadLetter;

/// Move a queue item into `dead_letters` in one transaction. Returns false if the item was
/// already gone from the queue.
pub async fn move_from_queue(pool: &SqlitePool, id: Uuid, error: &str) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO dead_letters (id, user_id, payload, attempts, created_at, dead_at, last_error)
         SELECT id, user_id, payload, attempts, created_at, ?, ?
         FROM offline_queue WHERE id = ?",
    )
    .bind(Utc::now())
    .bind(error)
    .bind(id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("DELETE FROM offline_queue WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

pub async fn list_by_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<DeadLetter>, sqlx::Error> {
    sqlx::query_as::<_, DeadLetter>(
        "SELECT id, user_id, payload, attempts, created_at, dead_at, last_error FROM dead_letters
         WHERE user_id = ?
         ORDER BY seq ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
