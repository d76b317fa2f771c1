#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode as AxumStatus;
use axum::routing::post;
use axum::{Json, Router};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use syncqueue::auth::jwt::{encode_token, Claims};
use syncqueue::config::Config;
use syncqueue::connectivity::Connectivity;
use syncqueue::events::{
    EventBus, Subscription, SyncEvent, QUEUE_UPDATED, QUEUE_UPDATED_LEGACY, SYNC_COMPLETE,
    SYNC_PROGRESS, SYNC_START,
};
use syncqueue::models::QueueItem;
use syncqueue::queue::QueueStore;
use syncqueue::remote::{RemoteActionApi, RemoteError, RemoteResponse};
use syncqueue::state::SharedState;
use syncqueue::sync::{SyncManager, SyncOptions};

pub const JWT_SECRET: &str = "test-jwt-secret-that-is-long-enough";
pub const JWT_AUDIENCE: &str = "authenticated";

/// Fresh in-memory database with migrations applied. One connection, kept alive for the
/// life of the pool, so every query sees the same database.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory sqlite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

// ── Scripted remote ─────────────────────────────────────────────

pub type Scripted = Result<RemoteResponse, RemoteError>;

/// In-process remote action API. Responses are keyed by the payload's `"name"` field;
/// unknown names succeed.
#[derive(Default)]
pub struct ScriptedRemote {
    responses: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
    after_first_call: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ScriptedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, name: &str, response: Scripted) {
        self.responses
            .lock()
            .unwrap()
            .insert(name.to_string(), response);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn after_first_call(&self, hook: impl FnOnce() + Send + 'static) {
        *self.after_first_call.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteActionApi for ScriptedRemote {
    async fn apply(&self, item: &QueueItem) -> Result<RemoteResponse, RemoteError> {
        let name = item.payload.0["name"].as_str().unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(name.clone());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let hook = self.after_first_call.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }

        let scripted = self.responses.lock().unwrap().get(&name).cloned();
        scripted.unwrap_or(Ok(RemoteResponse::applied(200)))
    }
}

// ── Event recording ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub name: String,
    pub event: SyncEvent,
}

pub struct EventLog {
    entries: Arc<Mutex<Vec<Recorded>>>,
    _subscriptions: Vec<Subscription>,
}

impl EventLog {
    pub fn attach(bus: &EventBus, names: &[&str]) -> Self {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let subscriptions = names
            .iter()
            .map(|name| {
                let entries = entries.clone();
                let owned = name.to_string();
                bus.subscribe(name, move |event| {
                    entries.lock().unwrap().push(Recorded {
                        name: owned.clone(),
                        event: *event,
                    });
                })
            })
            .collect();

        Self {
            entries,
            _subscriptions: subscriptions,
        }
    }

    /// Listen to the four drain lifecycle events only.
    pub fn lifecycle(bus: &EventBus) -> Self {
        Self::attach(bus, &[SYNC_START, SYNC_PROGRESS, SYNC_COMPLETE])
    }

    pub fn queue_updates(bus: &EventBus) -> Self {
        Self::attach(bus, &[QUEUE_UPDATED, QUEUE_UPDATED_LEGACY])
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.entries.lock().unwrap().iter().map(|r| r.event).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

// ── Manager harness ─────────────────────────────────────────────

pub struct SyncHarness {
    pub pool: SqlitePool,
    pub events: EventBus,
    pub store: QueueStore,
    pub connectivity: Connectivity,
    pub remote: Arc<ScriptedRemote>,
    pub manager: Arc<SyncManager>,
}

impl SyncHarness {
    pub async fn new() -> Self {
        Self::with_options(SyncOptions::default()).await
    }

    pub async fn with_options(options: SyncOptions) -> Self {
        let pool = memory_pool().await;
        let events = EventBus::new();
        let store = QueueStore::new(pool.clone(), events.clone());
        let connectivity = Connectivity::new(true);
        let remote = ScriptedRemote::new();
        let manager = Arc::new(SyncManager::new(
            store.clone(),
            connectivity.clone(),
            events.clone(),
            remote.clone(),
            options,
        ));

        Self {
            pool,
            events,
            store,
            connectivity,
            remote,
            manager,
        }
    }

    /// Queue an action whose payload is `{"name": name}`.
    pub async fn enqueue(&self, user_id: Uuid, name: &str) -> QueueItem {
        self.store
            .enqueue(user_id, &json!({ "name": name }))
            .await
            .expect("enqueue failed")
    }

    pub async fn queued_names(&self, user_id: Uuid) -> Vec<String> {
        self.store
            .queue_for_user(user_id)
            .await
            .expect("list failed")
            .into_iter()
            .map(|item| item.payload.0["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

// ── Fake remote HTTP server ─────────────────────────────────────

/// Records every request body. `payload.respond` picks the reply: a number is used as the
/// HTTP status, `"soft-fail"` returns 200 with `{"success": false, "status": 422}`.
#[derive(Clone, Default)]
pub struct FakeRemote {
    pub received: Arc<Mutex<Vec<Value>>>,
}

impl FakeRemote {
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

async fn fake_apply(
    State(remote): State<FakeRemote>,
    headers: axum::http::HeaderMap,
    Json(body): Json<Value>,
) -> (AxumStatus, Json<Value>) {
    let mut recorded = body.clone();
    recorded["idempotency_key"] = json!(headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default());
    remote.received.lock().unwrap().push(recorded);

    match &body["payload"]["respond"] {
        Value::Number(n) => {
            let code = n.as_u64().unwrap_or(500) as u16;
            let status = AxumStatus::from_u16(code).unwrap_or(AxumStatus::INTERNAL_SERVER_ERROR);
            (status, Json(json!({ "error": "scripted" })))
        }
        Value::String(s) if s == "soft-fail" => (
            AxumStatus::OK,
            Json(json!({ "success": false, "status": 422 })),
        ),
        _ => (AxumStatus::OK, Json(json!({ "success": true }))),
    }
}

pub async fn spawn_fake_remote() -> (SocketAddr, FakeRemote) {
    let remote = FakeRemote::default();
    let app = Router::new()
        .route("/apply", post(fake_apply))
        .with_state(remote.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake remote");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Fake remote failed");
    });

    (addr, remote)
}

// ── Service under test ──────────────────────────────────────────

pub struct TestApp {
    pub addr: SocketAddr,
    pub pool: SqlitePool,
    pub client: Client,
    pub state: SharedState,
    pub remote: FakeRemote,
}

pub fn test_config(remote_api_url: String) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_audience: JWT_AUDIENCE.to_string(),
        remote_api_url,
        remote_api_key: Some("service-key".to_string()),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        max_payload_size: 16 * 1024,
        sync_interval: Duration::from_secs(30),
        request_timeout: Duration::from_secs(5),
        max_attempts: None,
        probe: None,
        start_online: true,
        log_level: "warn".to_string(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn delete_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("delete request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Start a session for a new random user and return (user_id, token).
    pub async fn sign_in(&self) -> (Uuid, String) {
        let user_id = Uuid::now_v7();
        let token = token_for(user_id);
        let (body, status) = self.put_auth("/api/v1/session", &token, &json!({})).await;
        assert_eq!(status, StatusCode::OK, "session start failed: {body}");
        (user_id, token)
    }

    pub async fn enqueue(&self, token: &str, payload: Value) -> Value {
        let (body, status) = self
            .post_auth("/api/v1/queue", token, &json!({ "payload": payload }))
            .await;
        assert_eq!(status, StatusCode::ACCEPTED, "enqueue failed: {body}");
        body
    }

    pub async fn set_online(&self, online: bool) {
        let resp = self
            .client
            .put(self.url("/api/v1/connectivity"))
            .json(&json!({ "online": online }))
            .send()
            .await
            .expect("connectivity request failed");
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

pub fn token_for(user_id: Uuid) -> String {
    encode_token(&Claims::new(user_id, JWT_AUDIENCE), JWT_SECRET).expect("token encode failed")
}

/// Spawn the service on a random port with a fresh in-memory database and a fake remote.
pub async fn spawn_app() -> TestApp {
    let (remote_addr, remote) = spawn_fake_remote().await;
    let pool = memory_pool().await;
    let config = test_config(format!("http://{remote_addr}/apply"));

    let (app, state) = syncqueue::build_app(pool.clone(), config).expect("Failed to build app");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestApp {
        addr,
        pool,
        client: Client::new(),
        state,
        remote,
    }
}
