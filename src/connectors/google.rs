use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::SyncError;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const CACHE_SKEW_SECONDS: i64 = 60;
const MAX_RATE_LIMIT_RETRIES: usize = 5;
const MAX_BACKOFF_SECONDS: u64 = 32;
const REDACTED_BODY_MAX_LEN: usize = 200;

/// Budget for a single HTTP attempt. Rate-limit sleeps are not counted.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// How the session obtains bearer tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A token handed over by a sign-in flow; used as-is until it expires.
    AccessToken(String),
    /// Exchanged for short-lived access tokens on demand.
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

/// Which error kind a failed request maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Failure {
    Query,
    Write,
}

impl Failure {
    fn error(self, message: String) -> SyncError {
        match self {
            Self::Query => SyncError::Query(message),
            Self::Write => SyncError::Write(message),
        }
    }
}

/// Authenticated HTTP session shared by the Gmail, Sheets and Drive clients.
/// Tokens live in memory only.
#[derive(Debug)]
pub struct GoogleSession {
    client: Client,
    credentials: Credentials,
    token_url: String,
    request_timeout: StdDuration,
    cached: Mutex<Option<CachedAccessToken>>,
}

impl GoogleSession {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            client: Client::new(),
            credentials,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cached: Mutex::new(None),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: StdDuration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    async fn access_token(&self) -> Result<String, SyncError> {
        let (client_id, client_secret, refresh_token) = match &self.credentials {
            Credentials::AccessToken(token) => return Ok(token.clone()),
            Credentials::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
            } => (client_id, client_secret, refresh_token),
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| !token.is_expired()) {
            return Ok(token.access_token.clone());
        }

        let fresh = self
            .fetch_token(client_id, client_secret, refresh_token)
            .await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn fetch_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<CachedAccessToken, SyncError> {
        let response = self
            .client
            .post(&self.token_url)
            .timeout(self.request_timeout)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| self.send_error(e, "request oauth token", Failure::Query))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Query(format!("read oauth token response: {e}")))?;
        if !status.is_success() {
            return Err(SyncError::Query(format!(
                "oauth token request failed: status={} body={}",
                status,
                redact_response_body(&body)
            )));
        }

        let payload: OAuthTokenResponse = serde_json::from_str(&body)
            .map_err(|e| SyncError::Query(format!("decode oauth token response: {e}")))?;
        let expires_at = Utc::now()
            + Duration::seconds((payload.expires_in as i64).saturating_sub(CACHE_SKEW_SECONDS));

        Ok(CachedAccessToken {
            access_token: payload.access_token,
            expires_at,
        })
    }

    pub(crate) async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<String, SyncError> {
        self.execute(Method::GET, url, query, None, Failure::Query)
            .await
    }

    /// Sends one request, retrying only on HTTP 429.
    pub(crate) async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        failure: Failure,
    ) -> Result<String, SyncError> {
        let mut backoff_seconds = 1u64;

        for attempt in 0..=MAX_RATE_LIMIT_RETRIES {
            let token = self.access_token().await?;
            let mut request = self
                .client
                .request(method.clone(), url)
                .bearer_auth(&token)
                .header("accept", "application/json")
                .timeout(self.request_timeout)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(%method, url, attempt, "google api request");
            let response = request
                .send()
                .await
                .map_err(|e| self.send_error(e, &format!("{method} {url}"), failure))?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt == MAX_RATE_LIMIT_RETRIES {
                    let body = response.text().await.unwrap_or_default();
                    return Err(failure.error(format!(
                        "google api request exhausted retries: {}",
                        redact_response_body(&body)
                    )));
                }

                let retry_after_seconds = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(backoff_seconds);

                warn!(url, retry_after_seconds, "google api rate limited");
                sleep(StdDuration::from_secs(retry_after_seconds)).await;
                backoff_seconds = (backoff_seconds * 2).min(MAX_BACKOFF_SECONDS);
                continue;
            }

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| self.send_error(e, &format!("read body of {method} {url}"), failure))?;
            if !status.is_success() {
                return Err(failure.error(format!(
                    "google api request failed: status={} body={}",
                    status,
                    redact_response_body(&text)
                )));
            }

            return Ok(text);
        }

        Err(failure.error("google api request failed without response".to_string()))
    }

    fn send_error(&self, error: reqwest::Error, operation: &str, failure: Failure) -> SyncError {
        if error.is_timeout() {
            SyncError::Timeout {
                operation: operation.to_string(),
                after: self.request_timeout,
            }
        } else {
            failure.error(format!("google api {operation}: {error}"))
        }
    }
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    body: &str,
    what: &str,
    failure: Failure,
) -> Result<T, SyncError> {
    serde_json::from_str(body).map_err(|e| failure.error(format!("decode {what}: {e}")))
}

pub(crate) fn redact_response_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= REDACTED_BODY_MAX_LEN {
        return trimmed.to_string();
    }

    let mut end = REDACTED_BODY_MAX_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}…[truncated {} bytes]",
        &trimmed[..end],
        trimmed.len()
    )
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
struct OAuthTokenResponse {
    access_token: String,
    token_type: Option<String>,
    expires_in: u64,
    scope: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedAccessToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedAccessToken {
    fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}
