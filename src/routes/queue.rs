use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::indicator::IndicatorState;
use crate::models::{DeadLetter, QueueItem};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct EnqueueAction {
    pub payload: Value,
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<QueueItem>>, AppError> {
    let items = state.store.queue_for_user(auth.user_id).await?;
    Ok(Json(items))
}

pub async fn enqueue(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<EnqueueAction>,
) -> Result<(StatusCode, Json<QueueItem>), AppError> {
    if req.payload.is_null() {
        return Err(AppError::BadRequest("payload is required".to_string()));
    }

    let item = state
        .store
        .enqueue(auth.user_id, &req.payload)
        .await
        .map_err(|e| AppError::StorageUnavailable(format!("Failed to queue action: {e}")))?;

    if state.manager.current_user() == Some(auth.user_id) {
        state.request_sync();
    }

    Ok((StatusCode::ACCEPTED, Json(item)))
}

/// Let a user throw away one of their own queued actions. Unknown ids are not an error.
pub async fn discard(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let removed = state.store.remove_for_user(auth.user_id, id).await?;
    Ok(Json(json!({ "removed": removed })))
}

pub async fn status(
    _auth: AuthUser,
    State(state): State<SharedState>,
) -> Json<IndicatorState> {
    Json(state.indicator.snapshot())
}

pub async fn dead_letters(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<DeadLetter>>, AppError> {
    let letters = state.store.dead_letters_for_user(auth.user_id).await?;
    Ok(Json(letters))
}
