use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::connectors::IdentityVerifier;
use crate::error::SyncError;

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Checks Google ID tokens against the `tokeninfo` endpoint and the
/// configured OAuth client id.
#[derive(Debug, Clone)]
pub struct GoogleTokenVerifier {
    client: Client,
    client_id: String,
    endpoint: String,
}

impl GoogleTokenVerifier {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            client_id: client_id.into(),
            endpoint: GOOGLE_TOKENINFO_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait(?Send)]
impl IdentityVerifier for GoogleTokenVerifier {
    async fn verify(&self, id_token: &str) -> Result<String, SyncError> {
        let id_token = id_token.trim();
        if id_token.is_empty() {
            return Err(SyncError::AuthRejected);
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| SyncError::Query(format!("token verification request: {e}")))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(SyncError::Query(format!(
                "token verification endpoint failed: status={status}"
            )));
        }
        if !status.is_success() {
            debug!(%status, "identity token rejected by verifier");
            return Err(SyncError::AuthRejected);
        }

        let info: TokenInfo = response.json().await.map_err(|e| {
            warn!("unreadable token verification response: {e}");
            SyncError::AuthRejected
        })?;
        check_claims(&info, &self.client_id)
    }
}

fn check_claims(info: &TokenInfo, client_id: &str) -> Result<String, SyncError> {
    if info.aud != client_id {
        debug!(aud = %info.aud, "identity token issued for another client");
        return Err(SyncError::AuthRejected);
    }
    match info.sub.as_deref().map(str::trim) {
        Some(sub) if !sub.is_empty() => Ok(sub.to_string()),
        _ => Err(SyncError::AuthRejected),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
struct TokenInfo {
    aud: String,
    sub: Option<String>,
    email: Option<String>,
    exp: Option<String>,
}
