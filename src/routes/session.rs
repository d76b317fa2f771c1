use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::state::SharedState;

/// Make the caller the active user and kick off a drain of their queue.
pub async fn start(auth: AuthUser, State(state): State<SharedState>) -> Json<Value> {
    state.manager.set_current_user(Some(auth.user_id));
    state.request_sync();

    Json(json!({
        "user_id": auth.user_id,
        "online": state.connectivity.is_online(),
    }))
}

/// Sign-out hook: the queue is cleared before the active user is dropped. Only the active
/// user can end the session; anyone else gets `cleared: 0` and nothing changes.
pub async fn sign_out(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<Value>, AppError> {
    if state.manager.current_user() != Some(auth.user_id) {
        tracing::debug!(user_id = %auth.user_id, "Sign-out from inactive user ignored");
        return Ok(Json(json!({ "cleared": 0 })));
    }

    let removed = state.manager.sign_out().await?;
    tracing::info!(user_id = %auth.user_id, removed, "Signed out");

    Ok(Json(json!({ "cleared": removed })))
}
