use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::connectors::google::{decode, Failure, GoogleSession};
use crate::connectors::MailService;
use crate::error::SyncError;
use crate::models::{LabelInfo, MessagePage, RawMessage};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";
/// `messages.list` never returns more than this per page.
pub const GMAIL_MAX_PAGE_SIZE: u32 = 500;
const METADATA_HEADERS: &[&str] = &["Date", "From"];

#[derive(Debug, Clone)]
pub struct GmailApiClient {
    session: Arc<GoogleSession>,
    base_url: String,
}

impl GmailApiClient {
    pub fn new(session: Arc<GoogleSession>) -> Self {
        Self {
            session,
            base_url: GMAIL_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait(?Send)]
impl MailService for GmailApiClient {
    fn name(&self) -> &str {
        "gmail_api"
    }

    async fn list_messages(
        &self,
        query: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<MessagePage, SyncError> {
        let url = format!("{}/users/me/messages", self.base_url);
        let mut params = vec![
            ("q", query.to_string()),
            (
                "maxResults",
                max_results.clamp(1, GMAIL_MAX_PAGE_SIZE).to_string(),
            ),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let body = self.session.get(&url, &params).await?;
        let list: GmailMessageList = decode(&body, "gmail message list", Failure::Query)?;
        Ok(MessagePage {
            ids: list
                .messages
                .unwrap_or_default()
                .into_iter()
                .map(|stub| stub.id)
                .collect(),
            next_page_token: list.next_page_token.filter(|token| !token.is_empty()),
        })
    }

    async fn get_message(&self, id: &str) -> Result<RawMessage, SyncError> {
        let url = format!(
            "{}/users/me/messages/{}",
            self.base_url,
            urlencoding::encode(id)
        );
        let mut params = vec![("format", "metadata".to_string())];
        params.extend(
            METADATA_HEADERS
                .iter()
                .map(|header| ("metadataHeaders", header.to_string())),
        );

        let body = self.session.get(&url, &params).await?;
        decode(&body, &format!("gmail message {id}"), Failure::Query)
    }

    async fn get_label(&self, id: &str) -> Result<LabelInfo, SyncError> {
        let url = format!(
            "{}/users/me/labels/{}",
            self.base_url,
            urlencoding::encode(id)
        );
        let body = self.session.get(&url, &[]).await?;
        decode(&body, &format!("gmail label {id}"), Failure::Query)
    }
}

// --- Gmail API response types ---

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
struct GmailMessageList {
    messages: Option<Vec<GmailMessageStub>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
    #[serde(rename = "resultSizeEstimate")]
    result_size_estimate: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
struct GmailMessageStub {
    id: String,
    #[serde(rename = "threadId")]
    thread_id: Option<String>,
}
