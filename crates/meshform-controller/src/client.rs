//! Controller API client
//!
//! The controller exposes a single endpoint, `POST {base}/v2/api`, taking a
//! JSON body `{ "action": ..., "CID": ..., ...params }` and answering with
//! `{ "return": bool, "results": ..., "reason": ... }`. `CID` is the session
//! id handed out by the `login` action.

use crate::error::{ControllerError, Result};
use meshform_cloud::{RetryConfig, Snapshot};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const API_PATH: &str = "v2/api";

pub struct ControllerClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
    session: Mutex<Option<String>>,
    pub(crate) retry: RetryConfig,
}

impl ControllerClient {
    pub fn new(
        base_url: Url,
        username: impl Into<String>,
        password: impl Into<String>,
        verify_tls: bool,
    ) -> Result<Self> {
        if !verify_tls {
            warn!(controller = %base_url, "TLS certificate verification disabled");
        }
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(concat!("meshform/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, base_url, username, password))
    }

    /// Use a pre-built `reqwest::Client`
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url,
            username: username.into(),
            password: password.into(),
            session: Mutex::new(None),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn api_url(&self) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{API_PATH}"))?)
    }

    /// Log in and cache the session id.
    pub async fn login(&self) -> Result<()> {
        let cid = self.request_session().await?;
        *self.session.lock().await = Some(cid);
        Ok(())
    }

    async fn request_session(&self) -> Result<String> {
        debug!(controller = %self.base_url, user = %self.username, "Logging in");
        let body = serde_json::json!({
            "action": "login",
            "username": self.username,
            "password": self.password,
        });
        let response = self.http.post(self.api_url()?).json(&body).send().await?;
        let envelope = parse_envelope("login", response)
            .await
            .map_err(|e| match e {
                ControllerError::Api { reason, .. } => ControllerError::Authentication(reason),
                other => other,
            })?;

        let cid = envelope
            .cid
            .or_else(|| envelope.results.get("CID").and_then(Value::as_str).map(str::to_string))
            .ok_or_else(|| ControllerError::InvalidResponse {
                action: "login".to_string(),
                message: "no CID in response".to_string(),
            })?;
        info!(controller = %self.base_url, "Logged in");
        Ok(cid)
    }

    async fn session_id(&self) -> Result<String> {
        let mut session = self.session.lock().await;
        if let Some(cid) = session.as_ref() {
            return Ok(cid.clone());
        }
        let cid = self.request_session().await?;
        *session = Some(cid.clone());
        Ok(cid)
    }

    /// Run one action and return its `results`.
    ///
    /// An expired session is renewed once.
    pub async fn call(&self, action: &str, params: &Snapshot) -> Result<Value> {
        let mut renewed = false;
        loop {
            let cid = self.session_id().await?;
            let mut body = params.clone();
            body.insert("action".to_string(), Value::from(action));
            body.insert("CID".to_string(), Value::from(cid));

            trace!(action, "POST {}", API_PATH);
            let response = self.http.post(self.api_url()?).json(&body).send().await?;
            match parse_envelope(action, response).await {
                Ok(envelope) => return Ok(envelope.results),
                Err(ControllerError::Api { reason, .. })
                    if !renewed && is_session_expired(&reason) =>
                {
                    debug!(action, "Session expired, logging in again");
                    *self.session.lock().await = None;
                    renewed = true;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "return")]
    ok: bool,
    #[serde(default)]
    results: Value,
    #[serde(default)]
    reason: String,
    #[serde(rename = "CID", default)]
    cid: Option<String>,
}

async fn parse_envelope(action: &str, response: reqwest::Response) -> Result<Envelope> {
    let status = response.status();
    let body = response.text().await?;

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ControllerError::NotFound(action.to_string()));
    }
    if !status.is_success() {
        return Err(ControllerError::Http {
            status: status.as_u16(),
            body,
        });
    }

    let envelope: Envelope =
        serde_json::from_str(&body).map_err(|e| ControllerError::InvalidResponse {
            action: action.to_string(),
            message: e.to_string(),
        })?;
    if envelope.ok {
        return Ok(envelope);
    }

    if envelope.reason.contains("does not exist") {
        let what = envelope
            .reason
            .split(" does not exist")
            .next()
            .unwrap_or_default();
        return Err(ControllerError::NotFound(what.trim().to_string()));
    }
    Err(ControllerError::Api {
        action: action.to_string(),
        reason: envelope.reason,
    })
}

fn is_session_expired(reason: &str) -> bool {
    let reason = reason.to_ascii_lowercase();
    reason.contains("cid is invalid") || reason.contains("session expired")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_ignores_trailing_slash() {
        for base in ["https://ctrl.example.com", "https://ctrl.example.com/"] {
            let client = ControllerClient::with_client(
                reqwest::Client::new(),
                Url::parse(base).unwrap(),
                "admin",
                "pw",
            );
            assert_eq!(
                client.api_url().unwrap().as_str(),
                "https://ctrl.example.com/v2/api"
            );
        }
    }

    #[test]
    fn test_session_expired_reasons() {
        assert!(is_session_expired("CID is invalid or expired."));
        assert!(is_session_expired("Session expired"));
        assert!(!is_session_expired("Gateway spoke-1 does not exist"));
    }
}
