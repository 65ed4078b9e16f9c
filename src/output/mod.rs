pub mod json;
pub mod table;

use anyhow::Result;
use serde::Serialize;

use crate::auth::SignInOutcome;
use crate::models::Watermark;
use crate::sync::SyncReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Table
        }
    }
}

/// What `status` knows about the target spreadsheet.
#[derive(Debug, Clone, Serialize)]
pub struct SheetStatus {
    pub sheet_name: String,
    pub spreadsheet_id: Option<String>,
    pub watermark: Option<Watermark>,
}

pub fn format_sync_report(format: OutputFormat, report: &SyncReport) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_sync_report(report)),
        OutputFormat::Json => json::to_pretty(report),
    }
}

pub fn format_status(format: OutputFormat, status: &SheetStatus) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_status(status)),
        OutputFormat::Json => json::to_pretty(status),
    }
}

pub fn format_sign_in(format: OutputFormat, outcome: &SignInOutcome) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(table::format_sign_in(outcome)),
        OutputFormat::Json => json::to_pretty(outcome),
    }
}
