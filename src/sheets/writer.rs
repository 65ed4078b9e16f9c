use tracing::debug;

use crate::connectors::SpreadsheetService;
use crate::error::SyncError;
use crate::models::SpreadsheetRow;

pub const DATA_SHEET: &str = "Sheet1";

/// `Sheet1!A{start}:B{end}`.
pub fn rows_range(start_row: u32, end_row: u32) -> String {
    format!("{DATA_SHEET}!A{start_row}:B{end_row}")
}

/// Writes `rows` to columns A and B starting at `start_row` and returns the
/// last row written. With no rows nothing is sent and `start_row - 1` comes
/// back. Failures are returned as-is.
pub async fn append_rows(
    sheets: &dyn SpreadsheetService,
    spreadsheet_id: &str,
    rows: Vec<SpreadsheetRow>,
    start_row: u32,
) -> Result<u32, SyncError> {
    if rows.is_empty() {
        return Ok(start_row.saturating_sub(1));
    }

    let count = u32::try_from(rows.len())
        .map_err(|_| SyncError::InvalidArgument(format!("{} rows in one write", rows.len())))?;
    let end_row = start_row + count - 1;
    let range = rows_range(start_row, end_row);
    debug!(%range, rows = count, "writing rows");

    let values = rows.into_iter().map(SpreadsheetRow::into_cells).collect();
    sheets.update_range(spreadsheet_id, &range, values).await?;
    Ok(end_row)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{append_rows, rows_range};
    use crate::connectors::SpreadsheetService;
    use crate::error::SyncError;
    use crate::models::{FilePage, SpreadsheetRow};

    #[derive(Default)]
    struct RecordingSheet {
        writes: Mutex<Vec<(String, Vec<Vec<Value>>)>>,
        reject: bool,
    }

    #[async_trait(?Send)]
    impl SpreadsheetService for RecordingSheet {
        fn name(&self) -> &str {
            "recording"
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

        async fn get_range(&self, _id: &str, _range: &str) -> Result<Vec<Vec<Value>>, SyncError> {
            Ok(Vec::new())
        }

        async fn update_range(
            &self,
            _id: &str,
            range: &str,
            values: Vec<Vec<Value>>,
        ) -> Result<(), SyncError> {
            if self.reject {
                return Err(SyncError::Write("status=403".to_string()));
            }
            self.writes
                .lock()
                .expect("lock writes")
                .push((range.to_string(), values));
            Ok(())
        }
    }

    fn row(date: &str, from: &str) -> SpreadsheetRow {
        SpreadsheetRow {
            date: date.to_string(),
            from: from.to_string(),
        }
    }

    #[tokio::test]
    async fn nothing_to_write_means_no_call_and_no_advance() {
        let sheet = RecordingSheet::default();
        let end = append_rows(&sheet, "sheet", Vec::new(), 5)
            .await
            .expect("append");
        assert_eq!(end, 4);
        assert!(sheet.writes.lock().expect("lock writes").is_empty());
    }

    #[tokio::test]
    async fn two_rows_from_row_five_land_in_a5_b6() {
        let sheet = RecordingSheet::default();
        let end = append_rows(
            &sheet,
            "sheet",
            vec![row("3/14/26", "Acme"), row("3/15/26", "Globex")],
            5,
        )
        .await
        .expect("append");

        assert_eq!(end, 6);
        let writes = sheet.writes.lock().expect("lock writes");
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "Sheet1!A5:B6");
        assert_eq!(
            writes[0].1,
            vec![
                vec![json!("3/14/26"), json!("Acme")],
                vec![json!("3/15/26"), json!("Globex")],
            ]
        );
    }

    #[tokio::test]
    async fn write_failures_surface() {
        let sheet = RecordingSheet {
            reject: true,
            ..RecordingSheet::default()
        };
        let result = append_rows(&sheet, "sheet", vec![row("1/01/26", "Acme")], 2).await;
        assert!(matches!(result, Err(SyncError::Write(_))));
    }

    #[test]
    fn range_uses_columns_a_and_b() {
        assert_eq!(rows_range(2, 2), "Sheet1!A2:B2");
    }
}
