use async_trait::async_trait;
use serde_json::Value;

use crate::error::SyncError;
use crate::models::{FilePage, LabelInfo, MessagePage, RawMessage};

pub mod gmail_api;
pub mod google;
pub mod sheets_api;
pub mod token_verifier;

pub use gmail_api::GmailApiClient;
pub use google::{Credentials, GoogleSession};
pub use sheets_api::SheetsApiClient;
pub use token_verifier::GoogleTokenVerifier;

/// The mail service the pipeline reads from.
#[async_trait(?Send)]
pub trait MailService: Send + Sync {
    fn name(&self) -> &str;

    /// One page of message ids matching `query`.
    async fn list_messages(
        &self,
        query: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<MessagePage, SyncError>;

    async fn get_message(&self, id: &str) -> Result<RawMessage, SyncError>;

    async fn get_label(&self, id: &str) -> Result<LabelInfo, SyncError>;
}

/// Spreadsheet and file listing service holding rows and the watermark.
#[async_trait(?Send)]
pub trait SpreadsheetService: Send + Sync {
    fn name(&self) -> &str;

    /// One page of spreadsheet files matching `name` that are not trashed.
    async fn list_spreadsheets(
        &self,
        name: &str,
        page_token: Option<&str>,
    ) -> Result<FilePage, SyncError>;

    /// Creates a spreadsheet with default properties and returns its id.
    async fn create_spreadsheet(&self, title: &str) -> Result<String, SyncError>;

    /// Cell values of an A1 range; empty when the range holds nothing.
    async fn get_range(&self, spreadsheet_id: &str, range: &str)
        -> Result<Vec<Vec<Value>>, SyncError>;

    /// Overwrites an A1 range. Non-success responses surface as
    /// [`SyncError::Write`].
    async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> Result<(), SyncError>;
}

/// Verifies identity tokens handed over by a sign-in flow.
#[async_trait(?Send)]
pub trait IdentityVerifier: Send + Sync {
    /// Returns the user identifier, or [`SyncError::AuthRejected`].
    async fn verify(&self, id_token: &str) -> Result<String, SyncError>;
}
