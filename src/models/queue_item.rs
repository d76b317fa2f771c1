use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use uuid::Uuid;

/// An action captured while the remote side was unreachable, waiting to be replayed.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QueueItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payload: Json<serde_json::Value>,
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
}
