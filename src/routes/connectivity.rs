use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::SharedState;

#[derive(Deserialize)]
pub struct ConnectivityUpdate {
    pub online: bool,
}

pub async fn get(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({ "online": state.connectivity.is_online() }))
}

/// The host runtime reports its own online/offline transitions here. Going online wakes the
/// worker through its connectivity subscription.
pub async fn update(
    State(state): State<SharedState>,
    Json(req): Json<ConnectivityUpdate>,
) -> Json<Value> {
    let changed = state.connectivity.set_online(req.online);
    Json(json!({ "online": req.online, "changed": changed }))
}
