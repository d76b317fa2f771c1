pub mod connectivity;
pub mod events;
pub mod queue;
pub mod session;
pub mod sync;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Session
        .route(
            "/api/v1/session",
            put(session::start).delete(session::sign_out),
        )
        // Queue
        .route("/api/v1/queue", get(queue::list).post(queue::enqueue))
        .route("/api/v1/queue/status", get(queue::status))
        .route("/api/v1/queue/dead-letters", get(queue::dead_letters))
        .route("/api/v1/queue/{id}", delete(queue::discard))
        // Sync
        .route("/api/v1/sync", post(sync::run))
        .route("/api/v1/connectivity", put(connectivity::update).get(connectivity::get))
        .route("/api/v1/events", get(events::stream))
}
