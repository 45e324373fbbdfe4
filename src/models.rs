//! Data models for extracted articles and their exported representations.
//!
//! - [`ArticleRecord`]: one article as extracted from the listing page
//! - [`ExportedRow`]: a record enriched with its export id and normalized date
//! - [`CanonicalDate`]: a calendar date rendered as `YYYY/M/D`

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A single article pulled from the front page.
///
/// Records are immutable once extracted. The export id and the normalized
/// date are attached later by the text sink through [`ExportedRow`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticleRecord {
    /// Absolute article URL; the natural key in the row store.
    pub url: String,
    /// Headline text, whitespace trimmed.
    pub headline: String,
    /// Byline author text.
    pub author: String,
    /// Date exactly as printed on the page, e.g. `"Mar 14"`.
    pub raw_date: String,
}

impl ArticleRecord {
    pub fn new(
        url: impl Into<String>,
        headline: impl Into<String>,
        author: impl Into<String>,
        raw_date: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            headline: headline.into(),
            author: author.into(),
            raw_date: raw_date.into(),
        }
    }
}

/// A calendar date with an inferred year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CanonicalDate(pub NaiveDate);

impl fmt::Display for CanonicalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.0.year(), self.0.month(), self.0.day())
    }
}

/// A record as it was written to the text sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedRow<'a> {
    /// Sequential id, starting at 1, scoped to one run.
    pub id: usize,
    pub record: &'a ArticleRecord,
    pub date: CanonicalDate,
}

impl ExportedRow<'_> {
    /// Render the row as a text sink line (without trailing newline).
    pub fn to_line(&self) -> String {
        format!(
            "{} | {} | \"{}\" | {} | {}",
            self.id, self.record.url, self.record.headline, self.record.author, self.date
        )
    }
}
