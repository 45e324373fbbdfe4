//! Error taxonomy for the extraction and persistence pipeline.
//!
//! Each stage owns its error type. Per-record failures
//! ([`ExtractionFieldMissing`], [`DateError`], failed inserts) are collected
//! into reports and never abort a run; the stage-level errors are gathered in
//! [`RunError`], which `main` maps to a process exit code.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// A required field could not be located for one listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("entry #{index}: required field '{field}' is missing")]
pub struct ExtractionFieldMissing {
    /// Zero-based position of the entry in document order.
    pub index: usize,
    /// Name of the absent field (`headline`, `link`, `author`, `date`).
    pub field: &'static str,
}

/// The raw date string could not be turned into a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("malformed date '{raw}': no day-of-month digits")]
    MissingDay { raw: String },
    #[error("malformed date '{raw}': day-of-month '{digits}' is too large")]
    DayTooLarge { raw: String, digits: String },
    #[error("malformed date '{raw}': no recognizable month")]
    MissingMonth { raw: String },
    #[error("malformed date '{raw}': day {day} does not exist in month {month} of {year}")]
    DayOutOfRange {
        raw: String,
        year: i32,
        month: u32,
        day: u32,
    },
}

impl DateError {
    /// The raw string that failed to normalize.
    pub fn raw(&self) -> &str {
        match self {
            DateError::MissingDay { raw }
            | DateError::DayTooLarge { raw, .. }
            | DateError::MissingMonth { raw }
            | DateError::DayOutOfRange { raw, .. } => raw,
        }
    }
}

/// Navigation or page-parsing failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("cannot read page snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },
    #[error("invalid listing url '{0}'")]
    Url(String),
}

/// Text sink write failure.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("text sink {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Row store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot open row store {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("cannot create articles table: {0}")]
    Schema(#[source] rusqlite::Error),
    #[error("transaction failed: {0}")]
    Transaction(#[source] rusqlite::Error),
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// Configuration file failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A consistency check that did not hold after both sinks were written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("check '{check}' failed: {detail}")]
pub struct ValidationMismatch {
    pub check: &'static str,
    pub detail: String,
}

/// Run-level failure classes, one exit code each.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{} consistency check(s) failed", .0.len())]
    Validation(Vec<ValidationMismatch>),
}

impl RunError {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Config(_) => 2,
            RunError::Fetch(_) => 3,
            RunError::Sink(_) => 4,
            RunError::Store(_) => 5,
            RunError::Validation(_) => 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            RunError::Config(ConfigError::Read {
                path: "c.yaml".into(),
                source: io::Error::other("x"),
            }),
            RunError::Fetch(FetchError::Url("nope".into())),
            RunError::Sink(SinkError::Io {
                path: "out.txt".into(),
                source: io::Error::other("x"),
            }),
            RunError::Store(StoreError::Schema(rusqlite::Error::InvalidQuery)),
            RunError::Validation(vec![]),
        ];
        let codes: Vec<u8> = errors.iter().map(RunError::exit_code).collect();
        assert_eq!(codes, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_date_error_names_raw_value() {
        let e = DateError::MissingMonth {
            raw: "no date here".to_string(),
        };
        assert_eq!(e.raw(), "no date here");
        assert!(e.to_string().contains("no date here"));
    }

    #[test]
    fn test_field_missing_display() {
        let e = ExtractionFieldMissing {
            index: 3,
            field: "author",
        };
        assert_eq!(e.to_string(), "entry #3: required field 'author' is missing");
    }
}
