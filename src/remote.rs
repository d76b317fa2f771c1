use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::models::QueueItem;

/// What the remote action API said about one queued action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub success: bool,
    pub status: Option<u16>,
}

impl RemoteResponse {
    pub fn applied(status: u16) -> Self {
        Self {
            success: true,
            status: Some(status),
        }
    }

    pub fn rejected(status: Option<u16>) -> Self {
        Self {
            success: false,
            status,
        }
    }
}

/// The call itself failed (transport error, timeout). `status` is set only when the
/// failure still carried an HTTP status.
#[derive(Debug, Clone)]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn timeout(after: Duration) -> Self {
        RemoteError {
            status: None,
            message: format!("Remote call timed out after {}s", after.as_secs()),
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl From<String> for RemoteError {
    fn from(s: String) -> Self {
        RemoteError {
            status: None,
            message: s,
        }
    }
}

impl From<&str> for RemoteError {
    fn from(s: &str) -> Self {
        RemoteError {
            status: None,
            message: s.to_string(),
        }
    }
}

#[async_trait]
pub trait RemoteActionApi: Send + Sync {
    /// Apply one queued action on behalf of its owner.
    async fn apply(&self, item: &QueueItem) -> Result<RemoteResponse, RemoteError>;
}

/// Replays queued actions by POSTing them to a single HTTP endpoint.
pub struct HttpActionApi {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpActionApi {
    pub fn new(url: String, api_key: Option<String>, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build reqwest client: {e}"))?;

        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl RemoteActionApi for HttpActionApi {
    async fn apply(&self, item: &QueueItem) -> Result<RemoteResponse, RemoteError> {
        let body = json!({
            "id": item.id,
            "user_id": item.user_id,
            "payload": &item.payload,
            "attempts": item.attempts,
            "created_at": item.created_at,
        });

        let mut req = self
            .client
            .post(&self.url)
            .header("Idempotency-Key", item.id.to_string());

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.json(&body).send().await.map_err(|e| RemoteError {
            status: e.status().map(|s| s.as_u16()),
            message: format!("Remote request failed: {e}"),
        })?;

        let status_code = resp.status().as_u16();
        if !resp.status().is_success() {
            return Ok(RemoteResponse::rejected(Some(status_code)));
        }

        // A 2xx can still carry `{"success": false, "status": 4xx}` from the action handler.
        // The status already says applied; an unreadable body cannot take that back.
        let resp_body = match resp.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    item_id = %item.id,
                    "Failed to read remote response body after {status_code}: {e}"
                );
                String::new()
            }
        };
        let parsed = serde_json::from_str::<serde_json::Value>(&resp_body).ok();
        let reported_failure = parsed
            .as_ref()
            .and_then(|v| v.get("success"))
            .and_then(|v| v.as_bool())
            == Some(false);

        if reported_failure {
            let status = parsed
                .as_ref()
                .and_then(|v| v.get("status"))
                .and_then(|v| v.as_u64())
                .and_then(|s| u16::try_from(s).ok());
            return Ok(RemoteResponse::rejected(status));
        }

        Ok(RemoteResponse::applied(status_code))
    }
}
