use std::time::Duration;

use async_trait::async_trait;
use idlewatch_core::{ActionOutcome, RemoteId, ServerAction, StatsSnapshot};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ApiConfig;
use crate::error::RemoteError;

const MAX_ERROR_BODY_BYTES: usize = 512;

/// Operations the control loop and manual commands need from the remote API.
#[async_trait]
pub trait RemoteControl: Send + Sync {
    async fn fetch_stats(&self, remote_id: &RemoteId) -> Result<StatsSnapshot, RemoteError>;

    /// Runs an action. Remote and transport failures are folded into the outcome.
    async fn invoke_action(&self, remote_id: &RemoteId, action: ServerAction) -> ActionOutcome;
}

/// Stateless client for the management API. Cheap to clone.
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl Envelope {
    fn error_text(&self) -> String {
        match &self.error {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Null) | None => format!("remote status {:?}", self.status),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatsPayload {
    #[serde(default)]
    running: bool,
    #[serde(default, deserialize_with = "de_player_count")]
    online: Option<u32>,
    #[serde(default, deserialize_with = "de_player_count")]
    player_count: Option<u32>,
    #[serde(default)]
    players: Value,
    #[serde(default)]
    server_id: Value,
}

fn de_player_count<'de, D>(d: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::Bool(false) => Ok(Some(0)),
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid player count: {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid player count: {s:?}"))),
        other => Err(D::Error::custom(format!("invalid player count: {other}"))),
    }
}

/// Player names, only when reported as a JSON array of strings.
fn structured_players(v: &Value) -> Vec<String> {
    match v {
        Value::Array(items) => items
            .iter()
            .filter_map(|i| i.as_str())
            .map(|s| s.to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn truncate(s: &str) -> &str {
    if s.len() <= MAX_ERROR_BODY_BYTES {
        return s;
    }
    let mut end = MAX_ERROR_BODY_BYTES;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

impl RemoteClient {
    pub fn new(api: &ApiConfig) -> Result<Self, reqwest::Error> {
        Self::from_parts(api.base_url(), &api.token, api.timeout, api.accept_invalid_certs)
    }

    pub fn from_parts(
        base_url: impl Into<String>,
        token: &str,
        timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("idlewatch-control/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Sends one request and unwraps the `{status, data|error}` envelope.
    ///
    /// Returns `None` for an empty successful body.
    async fn request(&self, method: Method, path: &str) -> Result<Option<Value>, RemoteError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%method, %url, "remote request");

        let resp = self
            .http
            .request(method, &url)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        tracing::debug!(status = status.as_u16(), %url, "remote response");

        if text.trim().is_empty() {
            if status.is_success() {
                return Ok(None);
            }
            return Err(RemoteError::Protocol(format!("HTTP {status} with empty body")));
        }

        let envelope: Envelope = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) if status.is_success() => {
                return Err(RemoteError::Protocol(format!("malformed response: {e}")));
            }
            Err(_) => {
                return Err(RemoteError::Protocol(format!(
                    "HTTP {status}: {}",
                    truncate(text.trim())
                )));
            }
        };

        // An "ok" envelope only counts when the HTTP status agrees.
        if !status.is_success() {
            return Err(RemoteError::Protocol(format!(
                "HTTP {status}: {}",
                envelope.error_text()
            )));
        }

        if envelope.status != "ok" {
            return Err(RemoteError::Protocol(envelope.error_text()));
        }

        Ok(envelope.data)
    }
}

#[async_trait]
impl RemoteControl for RemoteClient {
    async fn fetch_stats(&self, remote_id: &RemoteId) -> Result<StatsSnapshot, RemoteError> {
        let data = self
            .request(Method::GET, &format!("/servers/{remote_id}/stats"))
            .await?
            .filter(|v| !v.is_null())
            .ok_or_else(|| RemoteError::Protocol("empty stats payload".to_string()))?;

        let stats: StatsPayload = serde_json::from_value(data)
            .map_err(|e| RemoteError::Protocol(format!("malformed stats payload: {e}")))?;
        let player_count = stats.online.or(stats.player_count).unwrap_or(0);

        tracing::debug!(
            %remote_id,
            server_name = stats.server_id.get("server_name").and_then(|v| v.as_str()).unwrap_or(""),
            running = stats.running,
            player_count,
            "fetched stats"
        );

        Ok(StatsSnapshot {
            running: stats.running,
            player_count,
            players: structured_players(&stats.players),
            observed_at: chrono::Utc::now(),
        })
    }

    async fn invoke_action(&self, remote_id: &RemoteId, action: ServerAction) -> ActionOutcome {
        tracing::info!(%remote_id, %action, "executing action");
        let path = format!("/servers/{remote_id}/action/{}", action.path_segment());
        match self.request(Method::POST, &path).await {
            Ok(data) => {
                tracing::debug!(%remote_id, %action, ?data, "action accepted");
                ActionOutcome::ok()
            }
            Err(e) => {
                tracing::warn!(%remote_id, %action, error = %e, "action failed");
                ActionOutcome::failed(e.to_string())
            }
        }
    }
}
