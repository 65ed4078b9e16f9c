use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row where data begins; row 1 is left to the user.
pub const DEFAULT_NEXT_ROW: u32 = 2;

/// A message as returned by the mail service. Only the fields the pipeline
/// reads are deserialized; attachments, bodies and thread metadata are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub id: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub payload: MessagePayload,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub headers: Vec<MessageHeader>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

/// One page of `messages.list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Trimmed projection of a [`RawMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LightEmail {
    pub message_id: String,
    pub date: Option<String>,
    pub from: Option<String>,
    pub snippet: String,
    pub label_name: Option<String>,
}

impl LightEmail {
    pub fn with_label(self, label_name: Option<String>) -> Self {
        Self { label_name, ..self }
    }
}

/// A `(date, sender)` pair destined for columns A and B.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpreadsheetRow {
    pub date: String,
    pub from: String,
}

impl SpreadsheetRow {
    pub fn into_cells(self) -> Vec<serde_json::Value> {
        vec![
            serde_json::Value::String(self.date),
            serde_json::Value::String(self.from),
        ]
    }
}

/// Sync progress persisted in the spreadsheet itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Watermark {
    pub last_scan: Option<DateTime<Utc>>,
    pub next_write_row: u32,
}

impl Default for Watermark {
    fn default() -> Self {
        Self {
            last_scan: None,
            next_write_row: DEFAULT_NEXT_ROW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    pub name: String,
}

/// One page of the file listing service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePage {
    pub files: Vec<FileRef>,
    pub next_page_token: Option<String>,
}
