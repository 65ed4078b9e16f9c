use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::connectors::google::{decode, Failure, GoogleSession};
use crate::connectors::SpreadsheetService;
use crate::error::SyncError;
use crate::models::{FilePage, FileRef};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

/// Sheets v4 for cell ranges, Drive v3 for finding spreadsheets by name.
#[derive(Debug, Clone)]
pub struct SheetsApiClient {
    session: Arc<GoogleSession>,
    sheets_base_url: String,
    drive_base_url: String,
}

impl SheetsApiClient {
    pub fn new(session: Arc<GoogleSession>) -> Self {
        Self {
            session,
            sheets_base_url: SHEETS_API_BASE.to_string(),
            drive_base_url: DRIVE_API_BASE.to_string(),
        }
    }

    pub fn with_base_urls(
        mut self,
        sheets_base_url: impl Into<String>,
        drive_base_url: impl Into<String>,
    ) -> Self {
        self.sheets_base_url = sheets_base_url.into().trim_end_matches('/').to_string();
        self.drive_base_url = drive_base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.sheets_base_url,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(range)
        )
    }
}

/// Drive query matching non-trashed spreadsheets with exactly this name.
pub fn spreadsheet_name_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("mimeType='{SPREADSHEET_MIME_TYPE}' and name='{escaped}' and trashed=false")
}

#[async_trait(?Send)]
impl SpreadsheetService for SheetsApiClient {
    fn name(&self) -> &str {
        "google_sheets"
    }

    async fn list_spreadsheets(
        &self,
        name: &str,
        page_token: Option<&str>,
    ) -> Result<FilePage, SyncError> {
        let url = format!("{}/files", self.drive_base_url);
        let mut params = vec![
            ("q", spreadsheet_name_query(name)),
            ("fields", "nextPageToken,files(id,name)".to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let body = self.session.get(&url, &params).await?;
        let list: DriveFileList = decode(&body, "drive file list", Failure::Query)?;
        Ok(FilePage {
            files: list.files.unwrap_or_default(),
            next_page_token: list.next_page_token.filter(|token| !token.is_empty()),
        })
    }

    async fn create_spreadsheet(&self, title: &str) -> Result<String, SyncError> {
        let url = format!("{}/spreadsheets", self.sheets_base_url);
        let body = json!({ "properties": { "title": title } });
        let response = self
            .session
            .execute(Method::POST, &url, &[], Some(&body), Failure::Write)
            .await?;
        let created: CreatedSpreadsheet = decode(&response, "created spreadsheet", Failure::Write)?;
        debug!(spreadsheet_id = %created.spreadsheet_id, title, "created spreadsheet");
        Ok(created.spreadsheet_id)
    }

    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<Value>>, SyncError> {
        let url = self.values_url(spreadsheet_id, range);
        let body = self.session.get(&url, &[]).await?;
        let values: ValueRange = decode(&body, &format!("range {range}"), Failure::Query)?;
        Ok(values.values.unwrap_or_default())
    }

    async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> Result<(), SyncError> {
        let url = self.values_url(spreadsheet_id, range);
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": values,
        });
        let response = self
            .session
            .execute(
                Method::PUT,
                &url,
                &[("valueInputOption", "RAW".to_string())],
                Some(&body),
                Failure::Write,
            )
            .await?;
        let update: UpdateValuesResponse =
            decode(&response, &format!("update of {range}"), Failure::Write)?;
        debug!(
            range,
            updated_rows = update.updated_rows.unwrap_or(0),
            updated_cells = update.updated_cells.unwrap_or(0),
            "range updated"
        );
        Ok(())
    }
}

// --- Sheets / Drive response types ---

#[derive(Debug, Clone, Deserialize)]
struct DriveFileList {
    files: Option<Vec<FileRef>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CreatedSpreadsheet {
    #[serde(rename = "spreadsheetId")]
    spreadsheet_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ValueRange {
    values: Option<Vec<Vec<Value>>>,
}

#[derive(Debug, Clone, Deserialize)]
struct UpdateValuesResponse {
    #[serde(rename = "updatedRows")]
    updated_rows: Option<u64>,
    #[serde(rename = "updatedCells")]
    updated_cells: Option<u64>,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{spreadsheet_name_query, SheetsApiClient, ValueRange};
    use crate::connectors::{Credentials, GoogleSession};

    #[test]
    fn name_query_filters_spreadsheets_and_trash() {
        assert_eq!(
            spreadsheet_name_query("job-apps-organizer"),
            "mimeType='application/vnd.google-apps.spreadsheet' and name='job-apps-organizer' and trashed=false"
        );
    }

    #[test]
    fn name_query_escapes_quotes() {
        let query = spreadsheet_name_query("Sam's apps");
        assert!(query.contains(r"name='Sam\'s apps'"));
    }

    #[test]
    fn empty_value_range_has_no_values() {
        let range: ValueRange =
            serde_json::from_str(r#"{"range":"Sheet1!J1:K1","majorDimension":"ROWS"}"#)
                .expect("decode value range");
        assert!(range.values.is_none());
    }

    #[test]
    fn values_url_encodes_a1_range() {
        let session = Arc::new(GoogleSession::new(Credentials::AccessToken(
            "token".to_string(),
        )));
        let client = SheetsApiClient::new(session)
            .with_base_urls("http://localhost/v4/", "http://localhost/drive/v3");
        assert_eq!(
            client.values_url("sheet-1", "Sheet1!J1:K1"),
            "http://localhost/v4/spreadsheets/sheet-1/values/Sheet1%21J1%3AK1"
        );
    }
}
