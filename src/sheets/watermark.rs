use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::connectors::SpreadsheetService;
use crate::dates::parse_date;
use crate::error::SyncError;
use crate::models::{Watermark, DEFAULT_NEXT_ROW};

/// `(last scan, next write row)` live in these two cells.
pub const WATERMARK_RANGE: &str = "Sheet1!J1:K1";

/// Reads and writes the watermark cells of one spreadsheet.
pub struct WatermarkStore<'a> {
    sheets: &'a dyn SpreadsheetService,
    spreadsheet_id: &'a str,
}

impl<'a> WatermarkStore<'a> {
    pub fn new(sheets: &'a dyn SpreadsheetService, spreadsheet_id: &'a str) -> Self {
        Self {
            sheets,
            spreadsheet_id,
        }
    }

    /// `None` on a fresh sheet. Stored values that cannot be read fall back
    /// to "no date" and row 2 rather than failing.
    pub async fn read(&self) -> Result<Option<Watermark>, SyncError> {
        let values = self
            .sheets
            .get_range(self.spreadsheet_id, WATERMARK_RANGE)
            .await?;
        let Some(row) = values.into_iter().next().filter(|row| !row.is_empty()) else {
            debug!("no watermark stored");
            return Ok(None);
        };

        let watermark = Watermark {
            last_scan: row.first().and_then(parse_last_scan),
            next_write_row: row.get(1).map_or(DEFAULT_NEXT_ROW, parse_next_row),
        };
        debug!(?watermark, "read watermark");
        Ok(Some(watermark))
    }

    /// Overwrites both cells. The timestamp is stored as RFC 3339.
    pub async fn write(&self, last_scan: DateTime<Utc>, next_write_row: u32) -> Result<(), SyncError> {
        let values = vec![vec![
            Value::String(last_scan.to_rfc3339()),
            Value::from(next_write_row),
        ]];
        self.sheets
            .update_range(self.spreadsheet_id, WATERMARK_RANGE, values)
            .await
    }
}

fn parse_last_scan(cell: &Value) -> Option<DateTime<Utc>> {
    let raw = cell.as_str()?;
    if raw.trim().is_empty() {
        return None;
    }
    match parse_date(raw) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(err) => {
            warn!("ignoring stored scan date: {err}");
            None
        }
    }
}

fn parse_next_row(cell: &Value) -> u32 {
    let parsed = match cell {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match parsed.and_then(|row| u32::try_from(row).ok()) {
        Some(row) if row > DEFAULT_NEXT_ROW => row,
        _ => DEFAULT_NEXT_ROW,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    use super::{parse_next_row, WatermarkStore, WATERMARK_RANGE};
    use crate::connectors::SpreadsheetService;
    use crate::error::SyncError;
    use crate::models::FilePage;

    /// Stores whatever was last written to the watermark range.
    #[derive(Default)]
    struct Cells {
        stored: Mutex<Vec<Vec<Value>>>,
    }

    #[async_trait(?Send)]
    impl SpreadsheetService for Cells {
        fn name(&self) -> &str {
            "cells"
        }

        async fn list_spreadsheets(
            &self,
            _name: &str,
            _page_token: Option<&str>,
        ) -> Result<FilePage, SyncError> {
            Ok(FilePage::default())
        }

        async fn create_spreadsheet(&self, _title: &str) -> Result<String, SyncError> {
            Ok("sheet".to_string())
        }

        async fn get_range(&self, _id: &str, range: &str) -> Result<Vec<Vec<Value>>, SyncError> {
            assert_eq!(range, WATERMARK_RANGE);
            Ok(self.stored.lock().expect("lock cells").clone())
        }

        async fn update_range(
            &self,
            _id: &str,
            range: &str,
            values: Vec<Vec<Value>>,
        ) -> Result<(), SyncError> {
            assert_eq!(range, WATERMARK_RANGE);
            *self.stored.lock().expect("lock cells") = values;
            Ok(())
        }
    }

    fn cells(values: Vec<Vec<Value>>) -> Cells {
        Cells {
            stored: Mutex::new(values),
        }
    }

    #[tokio::test]
    async fn fresh_sheet_has_no_watermark() {
        let sheet = Cells::default();
        let store = WatermarkStore::new(&sheet, "sheet");
        assert!(store.read().await.expect("read").is_none());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let sheet = Cells::default();
        let store = WatermarkStore::new(&sheet, "sheet");
        let scanned = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).single().expect("valid time");

        store.write(scanned, 17).await.expect("write");
        let watermark = store.read().await.expect("read").expect("stored watermark");
        assert_eq!(watermark.last_scan, Some(scanned));
        assert_eq!(watermark.next_write_row, 17);
    }

    #[tokio::test]
    async fn low_rows_read_back_as_default() {
        let sheet = Cells::default();
        let store = WatermarkStore::new(&sheet, "sheet");
        let scanned = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).single().expect("valid time");

        store.write(scanned, 1).await.expect("write");
        let watermark = store.read().await.expect("read").expect("stored watermark");
        assert_eq!(watermark.next_write_row, 2);
    }

    #[tokio::test]
    async fn unreadable_cells_fall_back_without_failing() {
        let sheet = cells(vec![vec![json!("last tuesday"), json!("row five")]]);
        let watermark = WatermarkStore::new(&sheet, "sheet")
            .read()
            .await
            .expect("read")
            .expect("stored watermark");
        assert_eq!(watermark.last_scan, None);
        assert_eq!(watermark.next_write_row, 2);
    }

    #[tokio::test]
    async fn legacy_date_strings_are_understood() {
        let sheet = cells(vec![vec![
            json!("Sat Sep 09 2017 14:03:11 GMT+0200 (CEST)"),
            json!("42"),
        ]]);
        let watermark = WatermarkStore::new(&sheet, "sheet")
            .read()
            .await
            .expect("read")
            .expect("stored watermark");
        let expected = Utc.with_ymd_and_hms(2017, 9, 9, 12, 3, 11).single().expect("valid time");
        assert_eq!(watermark.last_scan, Some(expected));
        assert_eq!(watermark.next_write_row, 42);
    }

    #[test]
    fn next_row_accepts_numbers_and_strings() {
        assert_eq!(parse_next_row(&json!(9)), 9);
        assert_eq!(parse_next_row(&json!(9.0)), 9);
        assert_eq!(parse_next_row(&json!(" 12 ")), 12);
        assert_eq!(parse_next_row(&json!(-4)), 2);
        assert_eq!(parse_next_row(&json!(null)), 2);
    }
}
