use std::future::Future;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use crate::connectors::gmail_api::GMAIL_MAX_PAGE_SIZE;
use crate::connectors::MailService;
use crate::dates::to_search_format;
use crate::error::SyncError;
use crate::models::RawMessage;

pub const DEFAULT_FETCH_CONCURRENCY: usize = 16;
pub const PER_LABEL_MAX_RESULTS: u32 = 1000;
pub const COMBINED_MAX_RESULTS: u32 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Upper bound on ids returned by one query, across pages.
    pub max_results: u32,
    /// Requests in flight at once during fan-out.
    pub concurrency: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_results: PER_LABEL_MAX_RESULTS,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }
}

/// `label:a OR label:b`, followed by ` after:YYYY/MM/DD` when a date is given.
pub fn build_query(labels: &[&str], since: Option<NaiveDate>) -> String {
    let mut query = labels
        .iter()
        .map(|label| format!("label:{label}"))
        .collect::<Vec<_>>()
        .join(" OR ");
    if let Some(date) = since {
        query.push_str(" after:");
        query.push_str(&to_search_format(&date));
    }
    query
}

/// Runs `operation` over `inputs` with at most `limit` in flight. Results
/// come back in completion order. The first error drops every request still
/// in flight. Per-request timeouts belong to the transport.
pub(crate) async fn fan_out<I, T, F, Fut>(
    inputs: Vec<I>,
    limit: usize,
    operation: F,
) -> Result<Vec<T>, SyncError>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    stream::iter(inputs)
        .map(operation)
        .buffer_unordered(limit.max(1))
        .try_collect()
        .await
}

/// Lists and downloads messages from a [`MailService`].
pub struct MessageFetcher<'a> {
    mail: &'a dyn MailService,
    options: FetchOptions,
}

impl<'a> MessageFetcher<'a> {
    pub fn new(mail: &'a dyn MailService, options: FetchOptions) -> Self {
        Self { mail, options }
    }

    /// Ids matching any of `labels`, received after `since`, up to
    /// `max_results`. No matches is an empty list.
    pub async fn list_ids(
        &self,
        labels: &[&str],
        since: Option<NaiveDate>,
    ) -> Result<Vec<String>, SyncError> {
        let query = build_query(labels, since);
        let limit = self.options.max_results as usize;
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        while ids.len() < limit {
            let remaining = (limit - ids.len()) as u32;
            let page = self
                .mail
                .list_messages(
                    &query,
                    remaining.min(GMAIL_MAX_PAGE_SIZE),
                    page_token.as_deref(),
                )
                .await?;
            debug!(query = %query, page_size = page.ids.len(), "listed message ids");

            ids.extend(page.ids);
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        ids.truncate(limit);
        Ok(ids)
    }

    /// Downloads every message in `ids`. Order follows completion, not input.
    pub async fn fetch_bodies(&self, ids: Vec<String>) -> Result<Vec<RawMessage>, SyncError> {
        let mail = self.mail;
        fan_out(ids, self.options.concurrency, |id| async move {
            mail.get_message(&id).await
        })
        .await
    }
}
