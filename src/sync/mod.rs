//! One incremental pass from labelled mail into the spreadsheet.
//!
//! A run moves through [`SyncStage`]s strictly in order. The watermark is
//! read once at the start and written once at the end, after every row has
//! been written; any failure before that leaves it untouched so the next run
//! picks the same messages up again.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::connectors::{MailService, SpreadsheetService};
use crate::dates::{parse_date, to_search_format, to_sheet_format};
use crate::error::SyncError;
use crate::mail::fetch::{FetchOptions, MessageFetcher, COMBINED_MAX_RESULTS, PER_LABEL_MAX_RESULTS};
use crate::mail::labels::{resolve_names, APPS_SENT, INTERESTING_LABELS};
use crate::mail::{extract, normalize};
use crate::models::{LightEmail, RawMessage, SpreadsheetRow};
use crate::sheets::{append_rows, find_or_create, WatermarkStore, DEFAULT_SHEET_NAME};

/// Report key for messages that carried none of the interesting labels.
pub const UNLABELLED: &str = "unlabelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Idle,
    ResolvingSheet,
    ReadingWatermark,
    Fetching,
    ResolvingLabels,
    Normalizing,
    Writing,
    UpdatingWatermark,
    Done,
    Failed,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ResolvingSheet => "resolving sheet",
            Self::ReadingWatermark => "reading watermark",
            Self::Fetching => "fetching",
            Self::ResolvingLabels => "resolving labels",
            Self::Normalizing => "normalizing",
            Self::Writing => "writing",
            Self::UpdatingWatermark => "updating watermark",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One query per interesting label, or a single `OR` query over all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryMode {
    #[default]
    PerLabel,
    Combined,
}

impl QueryMode {
    pub fn default_max_results(self) -> u32 {
        match self {
            Self::PerLabel => PER_LABEL_MAX_RESULTS,
            Self::Combined => COMBINED_MAX_RESULTS,
        }
    }
}

impl FromStr for QueryMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-label" | "per_label" => Ok(Self::PerLabel),
            "combined" => Ok(Self::Combined),
            other => Err(SyncError::Configuration(format!(
                "unknown query mode '{other}' (expected per-label or combined)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub sheet_name: String,
    pub mode: QueryMode,
    pub fetch: FetchOptions,
    /// Messages carrying this label become rows.
    pub record_label: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            mode: QueryMode::PerLabel,
            fetch: FetchOptions::default(),
            record_label: APPS_SENT.to_string(),
        }
    }
}

/// A message that was written with a raw value because a field could not
/// be converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordIssue {
    pub message_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub run_id: String,
    pub spreadsheet_id: String,
    pub spreadsheet_name: String,
    pub spreadsheet_created: bool,
    pub mode: QueryMode,
    /// `after:` date used for the queries, if any.
    pub since: Option<String>,
    pub messages_fetched: usize,
    pub label_counts: BTreeMap<String, usize>,
    pub rows_written: usize,
    pub first_row: u32,
    pub next_write_row: u32,
    pub scanned_at: DateTime<Utc>,
    pub issues: Vec<RecordIssue>,
}

#[derive(Debug, Error)]
#[error("sync failed while {stage}: {source}")]
pub struct SyncFailure {
    pub stage: SyncStage,
    #[source]
    pub source: SyncError,
}

/// Drives a run against a mail service and a spreadsheet service.
pub struct SyncOrchestrator<'a> {
    mail: &'a dyn MailService,
    sheets: &'a dyn SpreadsheetService,
    options: SyncOptions,
    clock: fn() -> DateTime<Utc>,
    stage: SyncStage,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        mail: &'a dyn MailService,
        sheets: &'a dyn SpreadsheetService,
        options: SyncOptions,
    ) -> Self {
        Self {
            mail,
            sheets,
            options,
            clock: Utc::now,
            stage: SyncStage::Idle,
        }
    }

    /// Replaces the wall clock used for the watermark timestamp.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn stage(&self) -> SyncStage {
        self.stage
    }

    pub async fn run(&mut self) -> Result<SyncReport, SyncFailure> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("sync", run_id = %run_id);

        let result = self.run_stages(run_id).instrument(span.clone()).await;
        let _entered = span.enter();
        match result {
            Ok(report) => {
                self.enter(SyncStage::Done);
                info!(
                    fetched = report.messages_fetched,
                    rows = report.rows_written,
                    next_row = report.next_write_row,
                    issues = report.issues.len(),
                    "sync finished"
                );
                Ok(report)
            }
            Err(failure) => {
                self.stage = SyncStage::Failed;
                error!(stage = %failure.stage, "sync failed: {}", failure.source);
                Err(failure)
            }
        }
    }

    async fn run_stages(&mut self, run_id: String) -> Result<SyncReport, SyncFailure> {
        self.enter(SyncStage::ResolvingSheet);
        let sheet = find_or_create(self.sheets, &self.options.sheet_name)
            .await
            .map_err(|source| self.failure(source))?;

        self.enter(SyncStage::ReadingWatermark);
        let store = WatermarkStore::new(self.sheets, &sheet.id);
        let watermark = store
            .read()
            .await
            .map_err(|source| self.failure(source))?
            .unwrap_or_default();
        let since = watermark
            .last_scan
            .map(|scanned| scanned.with_timezone(&Local).date_naive());

        self.enter(SyncStage::Fetching);
        let messages = self
            .fetch_messages(since)
            .await
            .map_err(|source| self.failure(source))?;

        self.enter(SyncStage::ResolvingLabels);
        let mapping = resolve_names(self.mail, &messages, self.options.fetch.concurrency)
            .await
            .map_err(|source| self.failure(source))?;

        self.enter(SyncStage::Normalizing);
        let emails: Vec<LightEmail> = messages
            .iter()
            .map(|message| extract(message).with_label(mapping.label_for(message)))
            .collect();
        let PreparedRows {
            rows,
            label_counts,
            issues,
        } = prepare_rows(&emails, &self.options.record_label)
            .map_err(|source| self.failure(source))?;

        self.enter(SyncStage::Writing);
        let rows_written = rows.len();
        let end_row = append_rows(self.sheets, &sheet.id, rows, watermark.next_write_row)
            .await
            .map_err(|source| self.failure(source))?;

        self.enter(SyncStage::UpdatingWatermark);
        let scanned_at = (self.clock)();
        let next_write_row = end_row + 1;
        store
            .write(scanned_at, next_write_row)
            .await
            .map_err(|source| self.failure(source))?;

        Ok(SyncReport {
            run_id,
            spreadsheet_id: sheet.id,
            spreadsheet_name: sheet.name,
            spreadsheet_created: sheet.created,
            mode: self.options.mode,
            since: since.map(|date| to_search_format(&date)),
            messages_fetched: messages.len(),
            label_counts,
            rows_written,
            first_row: watermark.next_write_row,
            next_write_row,
            scanned_at,
            issues,
        })
    }

    async fn fetch_messages(&self, since: Option<NaiveDate>) -> Result<Vec<RawMessage>, SyncError> {
        let fetcher = MessageFetcher::new(self.mail, self.options.fetch);
        let ids = match self.options.mode {
            QueryMode::Combined => fetcher.list_ids(&INTERESTING_LABELS, since).await?,
            QueryMode::PerLabel => {
                let mut ids = Vec::new();
                for label in INTERESTING_LABELS {
                    let found = fetcher.list_ids(&[label], since).await?;
                    debug!(label, count = found.len(), "listed label");
                    ids.extend(found);
                }
                ids
            }
        };

        let mut seen = HashSet::new();
        let unique: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        info!(count = unique.len(), "fetching message bodies");
        fetcher.fetch_bodies(unique).await
    }

    fn enter(&mut self, stage: SyncStage) {
        info!(from = %self.stage, to = %stage, "stage");
        self.stage = stage;
    }

    fn failure(&self, source: SyncError) -> SyncFailure {
        SyncFailure {
            stage: self.stage,
            source,
        }
    }
}

struct PreparedRows {
    rows: Vec<SpreadsheetRow>,
    label_counts: BTreeMap<String, usize>,
    issues: Vec<RecordIssue>,
}

/// Converts the recorded-label emails into rows ordered by their `Date`
/// header, oldest first, undated last, ties broken by message id.
fn prepare_rows(emails: &[LightEmail], record_label: &str) -> Result<PreparedRows, SyncError> {
    let mut label_counts = BTreeMap::new();
    let mut issues = Vec::new();
    let mut keyed = Vec::new();

    for email in emails {
        let label = email.label_name.as_deref().unwrap_or(UNLABELLED);
        *label_counts.entry(label.to_string()).or_insert(0) += 1;
        if label != record_label {
            continue;
        }

        let parsed = email.date.as_deref().map(parse_date);
        let date_cell = match (&email.date, &parsed) {
            (None, _) => String::new(),
            (Some(_), Some(Ok(date))) => to_sheet_format(&date.with_timezone(&Local)),
            (Some(raw), _) => keep_raw(
                email,
                raw,
                SyncError::InvalidArgument(format!("unreadable Date header '{raw}'")),
                &mut issues,
            )?,
        };
        let from_cell = match email.from.as_deref() {
            None => String::new(),
            Some(raw) => match normalize(raw, &email.snippet) {
                Ok(sender) => sender,
                Err(error) => keep_raw(email, raw, error, &mut issues)?,
            },
        };

        let sort_key: Option<DateTime<FixedOffset>> = parsed.and_then(Result::ok);
        keyed.push((
            sort_key,
            email.message_id.as_str(),
            SpreadsheetRow {
                date: date_cell,
                from: from_cell,
            },
        ));
    }

    keyed.sort_by(|a, b| {
        let by_date = match (&a.0, &b.0) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date.then_with(|| a.1.cmp(b.1))
    });

    Ok(PreparedRows {
        rows: keyed.into_iter().map(|(_, _, row)| row).collect(),
        label_counts,
        issues,
    })
}

/// Record-level errors keep the raw cell value and are reported; anything
/// else aborts the run.
fn keep_raw(
    email: &LightEmail,
    raw: &str,
    error: SyncError,
    issues: &mut Vec<RecordIssue>,
) -> Result<String, SyncError> {
    if !error.is_record_level() {
        return Err(error);
    }
    warn!(message_id = %email.message_id, "{error}");
    issues.push(RecordIssue {
        message_id: email.message_id.clone(),
        error: error.to_string(),
    });
    Ok(raw.to_string())
}
