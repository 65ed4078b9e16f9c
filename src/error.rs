use std::time::Duration;

use thiserror::Error;

/// Fixed marker returned to the sign-in caller when a token fails verification.
pub const AUTH_REJECTED_MARKER: &str = "sign-in rejected";

#[derive(Debug, Error)]
pub enum SyncError {
    /// A required setup value is missing; the process cannot proceed.
    #[error("configuration: {0}")]
    Configuration(String),

    #[error("{AUTH_REJECTED_MARKER}")]
    AuthRejected,

    /// A mail, sheet or file listing call returned an error payload.
    #[error("query failed: {0}")]
    Query(String),

    /// A spreadsheet update reported a non-success status.
    #[error("write failed: {0}")]
    Write(String),

    /// Sender normalisation could not locate the markers it expects.
    #[error("parse: {0}")]
    Parse(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
}

impl SyncError {
    /// Per-message problems that should not abort a whole run.
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::InvalidArgument(_))
    }
}
