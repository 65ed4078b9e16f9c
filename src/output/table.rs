use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::auth::SignInOutcome;
use crate::output::SheetStatus;
use crate::sync::SyncReport;

const LABEL_WIDTH: usize = 20;
const MESSAGE_ID_WIDTH: usize = 18;
const ISSUE_WIDTH: usize = 60;

pub fn format_sync_report(report: &SyncReport) -> String {
    let mut out = String::new();
    out.push_str("Sync complete\n");
    out.push_str("=============\n");
    out.push_str(&format!(
        "Spreadsheet: {} ({}){}\n",
        report.spreadsheet_name,
        report.spreadsheet_id,
        if report.spreadsheet_created { " [created]" } else { "" }
    ));
    out.push_str(&format!("Run:         {}\n", report.run_id));
    out.push_str(&format!(
        "Since:       {}\n",
        report.since.as_deref().unwrap_or("(first run)")
    ));
    out.push_str(&format!("Fetched:     {}\n", report.messages_fetched));

    if report.rows_written == 0 {
        out.push_str("Rows:        none written\n");
    } else {
        out.push_str(&format!(
            "Rows:        {} (rows {}-{})\n",
            report.rows_written,
            report.first_row,
            report.next_write_row - 1
        ));
    }
    out.push_str(&format!("Next row:    {}\n", report.next_write_row));
    out.push_str(&format!("Scanned at:  {}\n", report.scanned_at.to_rfc3339()));

    if !report.label_counts.is_empty() {
        out.push('\n');
        out.push_str("Label                 Messages\n");
        out.push_str("--------------------  --------\n");
        for (label, count) in &report.label_counts {
            out.push_str(&format!(
                "{:<width$}  {:>8}\n",
                truncate_for_width(label, LABEL_WIDTH),
                count,
                width = LABEL_WIDTH
            ));
        }
    }

    if !report.issues.is_empty() {
        out.push('\n');
        out.push_str(&format!("Written with raw values: {}\n", report.issues.len()));
        for issue in &report.issues {
            out.push_str(&format!(
                "- {:<id$}  {}\n",
                truncate_for_width(&issue.message_id, MESSAGE_ID_WIDTH),
                truncate_for_width(&issue.error, ISSUE_WIDTH),
                id = MESSAGE_ID_WIDTH
            ));
        }
    }

    out
}

pub fn format_status(status: &SheetStatus) -> String {
    let Some(id) = &status.spreadsheet_id else {
        return format!(
            "No spreadsheet named '{}' yet; it is created on the first sync.",
            status.sheet_name
        );
    };

    let mut out = String::new();
    out.push_str(&format!("Spreadsheet: {} ({id})\n", status.sheet_name));
    match &status.watermark {
        None => out.push_str("Watermark:   not written yet\n"),
        Some(watermark) => {
            out.push_str(&format!(
                "Last scan:   {}\n",
                watermark
                    .last_scan
                    .map(|scan| scan.to_rfc3339())
                    .unwrap_or_else(|| "(unset)".to_string())
            ));
            out.push_str(&format!("Next row:    {}\n", watermark.next_write_row));
        }
    }
    out
}

pub fn format_sign_in(outcome: &SignInOutcome) -> String {
    match outcome {
        SignInOutcome::Accepted { user_id } => format!("Signed in: {user_id}"),
        SignInOutcome::Rejected { message } => (*message).to_string(),
    }
}

fn truncate_for_width(value: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(value) <= max_width {
        return value.to_string();
    }

    if max_width <= 1 {
        return "…".to_string();
    }

    let mut out = String::new();
    let mut width = 0usize;
    for c in value.chars() {
        let cw = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + cw + 1 > max_width {
            break;
        }
        out.push(c);
        width += cw;
    }
    out.push('…');
    out
}
