use axum::extract::State;
use axum::Json;

use crate::auth::extractor::AuthUser;
use crate::state::SharedState;
use crate::sync::DrainOutcome;

/// Run one drain pass now and report what happened.
pub async fn run(_auth: AuthUser, State(state): State<SharedState>) -> Json<DrainOutcome> {
    Json(state.manager.process_queue().await)
}
