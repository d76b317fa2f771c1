pub mod auth;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod events;
pub mod indicator;
pub mod models;
pub mod queue;
pub mod remote;
pub mod routes;
pub mod state;
pub mod sync;
pub mod worker;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use sqlx::SqlitePool;
use tokio::sync::Notify;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::events::EventBus;
use crate::indicator::QueueIndicator;
use crate::queue::QueueStore;
use crate::remote::{HttpActionApi, RemoteActionApi};
use crate::state::{AppState, SharedState};
use crate::sync::{SyncManager, SyncOptions};

/// Build the service against the HTTP remote action API named in `config`.
pub fn build_app(pool: SqlitePool, config: Config) -> Result<(Router, SharedState), String> {
    let remote = HttpActionApi::new(
        config.remote_api_url.clone(),
        config.remote_api_key.clone(),
        config.request_timeout,
    )?;
    Ok(build_app_with_remote(pool, config, Arc::new(remote)))
}

/// Wire the store, bus, connectivity observer, manager and indicator together. Must be
/// called from within a Tokio runtime.
pub fn build_app_with_remote(
    pool: SqlitePool,
    config: Config,
    remote: Arc<dyn RemoteActionApi>,
) -> (Router, SharedState) {
    let events = EventBus::new();
    let store = QueueStore::new(pool, events.clone());
    let connectivity = Connectivity::new(config.start_online);

    let manager = Arc::new(SyncManager::new(
        store.clone(),
        connectivity.clone(),
        events.clone(),
        remote,
        SyncOptions {
            request_timeout: config.request_timeout,
            max_attempts: config.max_attempts,
        },
    ));

    let (indicator, _) = QueueIndicator::spawn(
        store.clone(),
        &events,
        &connectivity,
        manager.watch_user(),
    );

    let cors = cors_layer(&config.cors_origins);
    let body_limit = RequestBodyLimitLayer::new(config.max_payload_size);

    let state: SharedState = Arc::new(AppState {
        config,
        events,
        store,
        connectivity,
        manager,
        indicator,
        sync_trigger: Arc::new(Notify::new()),
    });

    let app = Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (app, state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {o}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn health() -> &'static str {
    "ok"
}
