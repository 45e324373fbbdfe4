//! Delimited text sink.
//!
//! Each run rewrites the file: the header line replaces any previous content,
//! then one line per record is appended.
//!
//! ```text
//! id | URL | headline | author | date
//! 1 | https://example.com/a | "Headline text" | Author Name | 2024/3/14
//! ```
//!
//! Free-text fields are written as-is. A `|` inside a headline or author
//! shifts the columns of that line.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::dates::{self, DatePolicy};
use crate::error::SinkError;
use crate::models::{ArticleRecord, ExportedRow};

/// First line of every text sink.
pub const HEADER: &str = "id | URL | headline | author | date";

/// Column separator.
pub const SEPARATOR: char = '|';

/// A record left out of the text sink because its date did not normalize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    /// Position of the record in the batch.
    pub index: usize,
    pub url: String,
    pub raw_date: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextSinkReport {
    pub path: PathBuf,
    /// Number of data lines written (ids `1..=written`).
    pub written: usize,
    pub skipped: Vec<SkippedRecord>,
}

/// Split a text sink line into its trimmed fields.
pub fn split_fields(line: &str) -> Vec<&str> {
    line.split(SEPARATOR).map(str::trim).collect()
}

/// Write `records` to `path`, replacing what was there.
///
/// Dates are normalized against `reference_year`. Records whose date cannot
/// be normalized are logged and skipped; ids stay contiguous over the lines
/// that are written.
///
/// # Errors
///
/// Returns [`SinkError::Io`] if the file cannot be created or appended to.
#[instrument(level = "info", skip_all, fields(path = %path.display(), records = records.len()))]
pub async fn write(
    records: &[ArticleRecord],
    path: &Path,
    reference_year: i32,
    policy: DatePolicy,
) -> Result<TextSinkReport, SinkError> {
    let io_err = |source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    };

    fs::write(path, format!("{HEADER}\n")).await.map_err(io_err)?;
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .await
        .map_err(io_err)?;

    let mut report = TextSinkReport {
        path: path.to_path_buf(),
        ..TextSinkReport::default()
    };

    for (index, record) in records.iter().enumerate() {
        let date = match dates::normalize(&record.raw_date, reference_year, policy) {
            Ok(date) => date,
            Err(e) => {
                warn!(
                    index,
                    url = %record.url,
                    raw_date = %record.raw_date,
                    error = %e,
                    "Date did not normalize; record left out of text sink"
                );
                report.skipped.push(SkippedRecord {
                    index,
                    url: record.url.clone(),
                    raw_date: e.raw().to_string(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let row = ExportedRow {
            id: report.written + 1,
            record,
            date,
        };
        let mut line = row.to_line();
        line.push('\n');
        file.write_all(line.as_bytes()).await.map_err(io_err)?;
        report.written += 1;
    }

    file.flush().await.map_err(io_err)?;
    info!(
        written = report.written,
        skipped = report.skipped.len(),
        "Wrote text sink"
    );
    Ok(report)
}
