//! Post-write consistency checks across both sinks.
//!
//! Runs after the text sink and the row store have been written. Every check
//! is evaluated independently and recorded in a [`ValidationReport`]; failed
//! checks are logged and returned, never raised.

use std::path::Path;

use itertools::Itertools;
use serde::Serialize;
use tokio::fs;
use tracing::{info, instrument, warn};

use crate::error::ValidationMismatch;
use crate::models::ArticleRecord;
use crate::outputs::store::RowStore;
use crate::outputs::text::{HEADER, split_fields};
use crate::utils::truncate_for_log;

/// Outcome of one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    /// Empty on success; otherwise what was wrong and where.
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<CheckResult>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn mismatches(&self) -> Vec<ValidationMismatch> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| ValidationMismatch {
                check: c.name,
                detail: c.detail.clone(),
            })
            .collect()
    }

    fn record(&mut self, name: &'static str, passed: bool, detail: impl Into<String>) {
        self.checks.push(CheckResult {
            name,
            passed,
            detail: if passed { String::new() } else { detail.into() },
        });
    }

    /// Record a check that passes when no offending line numbers were found.
    fn record_lines(&mut self, name: &'static str, offending: &[usize], what: &str) {
        let detail = format!(
            "{} on line(s) {}",
            what,
            truncate_for_log(&offending.iter().join(", "), 200)
        );
        self.record(name, offending.is_empty(), detail);
    }
}

/// Check the text sink at `text_sink` and the row store against `batch`.
///
/// `store` is `None` when the row store could not be opened; its checks are
/// then recorded as failed.
#[instrument(level = "info", skip_all, fields(path = %text_sink.display(), batch = batch.len()))]
pub async fn verify(
    batch: &[ArticleRecord],
    text_sink: &Path,
    store: Option<&RowStore>,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    match fs::read_to_string(text_sink).await {
        Ok(text) => check_text(&text, batch.len(), &mut report),
        Err(e) => report.record(
            "header",
            false,
            format!("cannot read {}: {e}", text_sink.display()),
        ),
    }
    let retained = match store {
        Some(store) => check_store(batch, store, &mut report),
        None => {
            report.record("row_count", false, "row store unavailable");
            report.record("urls_stored", false, "row store unavailable");
            0
        }
    };

    for mismatch in report.mismatches() {
        warn!(check = mismatch.check, detail = %mismatch.detail, "Consistency check failed");
    }
    if retained > 0 && report.check("urls_stored").is_some_and(|c| c.passed) {
        info!(
            retained,
            "Row count differs because the table keeps rows from earlier runs; every batch URL is stored"
        );
    }
    info!(
        checks = report.checks.len(),
        failed = report.checks.iter().filter(|c| !c.passed).count(),
        "Verified sinks"
    );
    report
}

fn check_text(text: &str, expected_rows: usize, report: &mut ValidationReport) {
    let mut lines = text.lines();
    let header = lines.next().unwrap_or_default();
    report.record(
        "header",
        header == HEADER,
        format!("expected '{HEADER}', found '{}'", truncate_for_log(header, 80)),
    );

    let mut bad_count = Vec::new();
    let mut bad_id = Vec::new();
    let mut bad_url = Vec::new();
    let mut empty = Vec::new();
    let mut data_lines = 0usize;

    // File line numbers are 1-based and the header is line 1.
    for (line_no, line) in lines.enumerate().map(|(i, l)| (i + 2, l)) {
        data_lines += 1;
        let fields = split_fields(line);

        if fields.len() != 5 {
            bad_count.push(line_no);
        }
        if fields[0].parse::<i64>().is_err() {
            bad_id.push(line_no);
        }
        if !fields.get(1).is_some_and(|url| url.starts_with("http")) {
            bad_url.push(line_no);
        }
        if !(2..5).all(|i| fields.get(i).is_some_and(|f| !f.is_empty())) {
            empty.push(line_no);
        }
    }

    report.record_lines("field_count", &bad_count, "expected 5 fields");
    report.record_lines("id_integer", &bad_id, "id is not an integer");
    report.record_lines("url_scheme", &bad_url, "URL does not start with http");
    report.record_lines("non_empty_fields", &empty, "empty headline, author or date");
    report.record(
        "text_row_count",
        data_lines == expected_rows,
        format!("text sink has {data_lines} row(s), batch has {expected_rows}"),
    );
}

/// Returns how many stored rows exceed the batch size. The table only grows,
/// so any excess is rows kept from earlier runs.
fn check_store(batch: &[ArticleRecord], store: &RowStore, report: &mut ValidationReport) -> u64 {
    let batch_len = batch.len() as u64;
    let mut retained = 0;
    match store.count() {
        Ok(count) => {
            let duplicates = batch.iter().map(|r| &r.url).duplicates().count();
            let mut detail = format!("row store has {count} row(s), batch has {batch_len}");
            if duplicates > 0 {
                detail.push_str(&format!(" ({duplicates} URL(s) repeated in the batch)"));
            }
            if count > batch_len {
                retained = count - batch_len;
                detail.push_str(&format!(" ({retained} row(s) retained from earlier runs)"));
            }
            report.record("row_count", count == batch_len, detail);
        }
        Err(e) => report.record("row_count", false, format!("cannot count rows: {e}")),
    }

    let mut missing = Vec::new();
    for record in batch {
        match store.contains_url(&record.url) {
            Ok(true) => {}
            Ok(false) => missing.push(record.url.as_str()),
            Err(e) => {
                report.record("urls_stored", false, format!("cannot query row store: {e}"));
                return retained;
            }
        }
    }
    report.record(
        "urls_stored",
        missing.is_empty(),
        format!(
            "{} URL(s) missing from row store: {}",
            missing.len(),
            truncate_for_log(&missing.join(", "), 200)
        ),
    );
    retained
}
