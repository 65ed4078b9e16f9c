//! Date conversions between parsed values and the two string forms the
//! pipeline needs: the mail search form (`YYYY/MM/DD`) and the spreadsheet
//! form (`M/DD/YY`).

use chrono::{DateTime, Datelike, FixedOffset, Local};

use crate::error::SyncError;

/// `Date.toString()`-style timestamps found in older sheets, after the
/// trailing zone name has been removed.
const LEGACY_TIMESTAMP_FORMAT: &str = "%a %b %d %Y %H:%M:%S GMT%z";

/// `YYYY/MM/DD`, zero padded.
pub fn to_search_format<D: Datelike>(date: &D) -> String {
    format!("{:04}/{:02}/{:02}", date.year(), date.month(), date.day())
}

/// `M/DD/YY` where the year is taken modulo 1000, so 2017 renders as `17`
/// but 2100 renders as `100`.
pub fn to_sheet_format<D: Datelike>(date: &D) -> String {
    format!(
        "{}/{:02}/{}",
        date.month(),
        date.day(),
        date.year().rem_euclid(1000)
    )
}

/// Parses a header or cell value into a timestamp. Accepts RFC 2822 (mail
/// `Date` headers, optionally with a trailing zone comment), RFC 3339 and the
/// legacy `Date.toString()` form.
pub fn parse_date(raw: &str) -> Result<DateTime<FixedOffset>, SyncError> {
    let trimmed = strip_zone_comment(raw.trim());
    if trimmed.is_empty() {
        return Err(SyncError::InvalidArgument("empty value is not a date".to_string()));
    }

    DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed))
        .or_else(|_| DateTime::parse_from_str(trimmed, LEGACY_TIMESTAMP_FORMAT))
        .map_err(|_| SyncError::InvalidArgument(format!("'{}' is not a date", raw.trim())))
}

/// String-facing [`to_search_format`]: the value is parsed first and the
/// calendar day is taken in local time.
pub fn search_format_from_str(raw: &str) -> Result<String, SyncError> {
    let parsed = parse_date(raw)?;
    Ok(to_search_format(&parsed.with_timezone(&Local)))
}

/// String-facing [`to_sheet_format`], local calendar day.
pub fn sheet_format_from_str(raw: &str) -> Result<String, SyncError> {
    let parsed = parse_date(raw)?;
    Ok(to_sheet_format(&parsed.with_timezone(&Local)))
}

fn strip_zone_comment(value: &str) -> &str {
    if !value.ends_with(')') {
        return value;
    }
    match value.rfind(" (") {
        Some(idx) => value[..idx].trim_end(),
        None => value,
    }
}
