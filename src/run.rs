//! One complete run: extract, write both sinks, verify.
//!
//! Stages run strictly in sequence. Extraction failure ends the run early;
//! a text sink failure does not prevent the row store write; verification
//! always runs once extraction succeeded, with store checks failing when the
//! row store could not be opened. Every stage-level failure is kept so the
//! caller can pick the exit code.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::ScrapeConfig;
use crate::error::{ExtractionFieldMissing, FetchError, RunError, SinkError};
use crate::models::ArticleRecord;
use crate::outputs::store::{RowStore, StoreReport};
use crate::outputs::text::{self, TextSinkReport};
use crate::scrapers::PageFetcher;
use crate::scrapers::front_page;
use crate::utils::ensure_writable_parent;
use crate::verify::{self, ValidationReport};

/// Everything a run produced, for logging and the optional JSON summary.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub listing_url: String,
    pub reference_year: i32,
    pub articles: Vec<ArticleRecord>,
    pub skipped_entries: Vec<ExtractionFieldMissing>,
    pub text_sink: Option<TextSinkReport>,
    pub row_store: Option<StoreReport>,
    pub validation: Option<ValidationReport>,
    /// Stage-level failures, rendered.
    pub errors: Vec<String>,
    pub elapsed_ms: u128,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub failures: Vec<RunError>,
}

impl RunOutcome {
    /// `0` on success, otherwise the lowest code among the failures.
    pub fn exit_code(&self) -> u8 {
        self.failures
            .iter()
            .map(RunError::exit_code)
            .min()
            .unwrap_or(0)
    }

    fn fail(&mut self, err: impl Into<RunError>) {
        let err = err.into();
        error!(error = %err, exit_code = err.exit_code(), "Run stage failed");
        self.summary.errors.push(err.to_string());
        self.failures.push(err);
    }
}

/// Run the whole pipeline against `config`, fetching through `fetcher`.
#[instrument(level = "info", skip_all, fields(url = %config.url, reference_year = reference_year))]
pub async fn run<F: PageFetcher>(config: &ScrapeConfig, fetcher: &F, reference_year: i32) -> RunOutcome {
    let started = Instant::now();
    let mut outcome = RunOutcome {
        summary: RunSummary {
            listing_url: config.url.clone(),
            reference_year,
            ..RunSummary::default()
        },
        failures: Vec::new(),
    };

    let batch = match extract(config, fetcher).await {
        Ok(extraction) => {
            outcome.summary.skipped_entries = extraction.skipped;
            extraction.articles
        }
        Err(e) => {
            outcome.fail(e);
            outcome.summary.elapsed_ms = started.elapsed().as_millis();
            return outcome;
        }
    };
    if batch.is_empty() {
        warn!("Listing page produced no articles");
    }

    match write_text_sink(config, &batch, reference_year).await {
        Ok(report) => outcome.summary.text_sink = Some(report),
        Err(e) => outcome.fail(e),
    }

    let mut store = match RowStore::open(&config.database_path) {
        Ok(store) => {
            debug!(database = %store.path().display(), "Row store open");
            Some(store)
        }
        Err(e) => {
            outcome.fail(e);
            None
        }
    };
    if let Some(store) = store.as_mut() {
        match store.ensure_schema() {
            Ok(()) => match store.persist(&batch) {
                Ok(report) => outcome.summary.row_store = Some(report),
                Err(e) => outcome.fail(e),
            },
            Err(e) => outcome.fail(e),
        }
    }

    let report = verify::verify(&batch, &config.text_sink_path, store.as_ref()).await;
    if !report.passed() {
        outcome.fail(RunError::Validation(report.mismatches()));
    }
    outcome.summary.validation = Some(report);

    if let Some(Err(e)) = store.map(RowStore::close) {
        outcome.fail(e);
    }

    outcome.summary.articles = batch;
    let elapsed = started.elapsed();
    outcome.summary.elapsed_ms = elapsed.as_millis();
    log_summary(&outcome, elapsed);
    outcome
}

async fn extract<F: PageFetcher>(
    config: &ScrapeConfig,
    fetcher: &F,
) -> Result<front_page::Extraction, FetchError> {
    let url = Url::parse(&config.url).map_err(|_| FetchError::Url(config.url.clone()))?;
    front_page::extract(fetcher, &url, &config.selectors).await
}

async fn write_text_sink(
    config: &ScrapeConfig,
    batch: &[ArticleRecord],
    reference_year: i32,
) -> Result<TextSinkReport, SinkError> {
    let path = &config.text_sink_path;
    ensure_writable_parent(path)
        .await
        .map_err(|source| SinkError::Io {
            path: path.clone(),
            source,
        })?;
    text::write(batch, path, reference_year, config.date_policy).await
}

fn log_summary(outcome: &RunOutcome, elapsed: Duration) {
    let summary = &outcome.summary;
    info!(
        extracted = summary.articles.len(),
        skipped_entries = summary.skipped_entries.len(),
        text_rows = summary.text_sink.as_ref().map_or(0, |r| r.written),
        text_skipped = summary.text_sink.as_ref().map_or(0, |r| r.skipped.len()),
        inserted = summary.row_store.as_ref().map_or(0, StoreReport::inserted),
        duplicates = summary.row_store.as_ref().map_or(0, StoreReport::duplicates),
        insert_failures = summary.row_store.as_ref().map_or(0, StoreReport::failed),
        validation_passed = summary.validation.as_ref().is_some_and(ValidationReport::passed),
        row_count_matches = summary
            .validation
            .as_ref()
            .and_then(|v| v.check("row_count"))
            .is_some_and(|c| c.passed),
        ?elapsed,
        exit_code = outcome.exit_code(),
        "Run complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::DatePolicy;
    use crate::error::StoreError;
    use crate::scrapers::ListingPage;
    use crate::utils::current_year;
    use std::path::Path;

    const ONE_ARTICLE: &str = r#"
        <div class="post-block">
          <h2><a class="post-block__title__link" href="https://x/1">A</a></h2>
          <div class="river-byline"><span>Bob</span><span>Jan 5</span></div>
        </div>
    "#;

    struct StaticFetcher(String);

    impl PageFetcher for StaticFetcher {
        async fn navigate(&self, url: &Url) -> Result<ListingPage, FetchError> {
            Ok(ListingPage::parse(url.clone(), &self.0))
        }
    }

    struct FailingFetcher;

    impl PageFetcher for FailingFetcher {
        async fn navigate(&self, url: &Url) -> Result<ListingPage, FetchError> {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    fn config_in(dir: &Path) -> ScrapeConfig {
        ScrapeConfig {
            url: "https://x/".to_string(),
            text_sink_path: dir.join("YYYY-MM-DD_frontpage.txt"),
            database_path: dir.join("articles.db"),
            ..ScrapeConfig::default()
        }
    }

    fn stored_rows(path: &Path) -> Vec<(String, String, String, String)> {
        let conn = rusqlite::Connection::open(path).unwrap();
        let mut stmt = conn
            .prepare("SELECT url, headline, author, date FROM articles ORDER BY id")
            .unwrap();
        let rows: Vec<(String, String, String, String)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        rows
    }

    #[tokio::test]
    async fn test_end_to_end_single_article() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let year = current_year();

        let outcome = run(&config, &StaticFetcher(ONE_ARTICLE.to_string()), year).await;
        assert_eq!(outcome.exit_code(), 0, "{:?}", outcome.summary.errors);

        let text = std::fs::read_to_string(&config.text_sink_path).unwrap();
        assert_eq!(
            text,
            format!("id | URL | headline | author | date\n1 | https://x/1 | \"A\" | Bob | {year}/1/5\n")
        );

        assert_eq!(
            stored_rows(&config.database_path),
            vec![(
                "https://x/1".to_string(),
                "A".to_string(),
                "Bob".to_string(),
                "Jan 5".to_string()
            )]
        );

        let validation = outcome.summary.validation.as_ref().unwrap();
        assert!(validation.passed());
        assert!(validation.check("row_count").unwrap().passed);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent_in_row_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let fetcher = StaticFetcher(ONE_ARTICLE.to_string());

        run(&config, &fetcher, 2024).await;
        let second = run(&config, &fetcher, 2024).await;

        assert_eq!(second.exit_code(), 0);
        assert_eq!(second.summary.row_store.as_ref().unwrap().duplicates(), 1);
        assert_eq!(stored_rows(&config.database_path).len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let outcome = run(&config, &FailingFetcher, 2024).await;
        assert_eq!(outcome.exit_code(), 3);
        assert!(!config.text_sink_path.exists());
        assert!(!config.database_path.exists());
        assert!(outcome.summary.validation.is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_is_fetch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScrapeConfig {
            url: "not a url".to_string(),
            ..config_in(dir.path())
        };

        let outcome = run(&config, &StaticFetcher(String::new()), 2024).await;
        assert_eq!(outcome.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_text_sink_failure_still_writes_row_store() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let config = ScrapeConfig {
            text_sink_path: blocker.join("ledger.txt"),
            ..config_in(dir.path())
        };

        let outcome = run(&config, &StaticFetcher(ONE_ARTICLE.to_string()), 2024).await;

        assert_eq!(outcome.exit_code(), 4);
        assert!(outcome.failures.iter().any(|f| matches!(f, RunError::Validation(_))));
        assert_eq!(stored_rows(&config.database_path).len(), 1);
        assert!(!outcome.summary.validation.as_ref().unwrap().check("header").unwrap().passed);
    }

    #[tokio::test]
    async fn test_headline_wrapped_across_lines_stays_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let html = ONE_ARTICLE.replace(
            ">A</a>",
            ">Big\n          news <em>today</em>\n        </a>",
        );

        let outcome = run(&config, &StaticFetcher(html), 2024).await;
        assert_eq!(outcome.exit_code(), 0, "{:?}", outcome.summary.errors);

        let text = std::fs::read_to_string(&config.text_sink_path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(
            text.lines().nth(1),
            Some("1 | https://x/1 | \"Big news today\" | Bob | 2024/1/5")
        );
        assert_eq!(stored_rows(&config.database_path)[0].1, "Big news today");
    }

    #[tokio::test]
    async fn test_legacy_table_with_repeated_urls_is_store_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let conn = rusqlite::Connection::open(&config.database_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE articles (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 url TEXT NOT NULL, headline TEXT, author TEXT, date TEXT
             );
             INSERT INTO articles (url, headline, author, date) VALUES ('https://old/1', 'O', 'Al', 'Jan 1');
             INSERT INTO articles (url, headline, author, date) VALUES ('https://old/1', 'O', 'Al', 'Jan 1');",
        )
        .unwrap();
        drop(conn);

        let outcome = run(&config, &StaticFetcher(ONE_ARTICLE.to_string()), 2024).await;

        assert_eq!(outcome.exit_code(), 5);
        assert!(
            outcome
                .failures
                .iter()
                .any(|f| matches!(f, RunError::Store(StoreError::Schema(_))))
        );
        assert!(outcome.summary.row_store.is_none());
        let rows = stored_rows(&config.database_path);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.0 == "https://old/1"));

        let validation = outcome.summary.validation.as_ref().unwrap();
        assert!(validation.check("header").unwrap().passed);
        assert!(!validation.check("urls_stored").unwrap().passed);
    }

    #[tokio::test]
    async fn test_unopenable_row_store_is_store_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScrapeConfig {
            database_path: dir.path().join("missing-dir/articles.db"),
            ..config_in(dir.path())
        };

        let outcome = run(&config, &StaticFetcher(ONE_ARTICLE.to_string()), 2024).await;

        assert_eq!(outcome.exit_code(), 5);
        assert!(
            outcome
                .failures
                .iter()
                .any(|f| matches!(f, RunError::Store(StoreError::Open { .. })))
        );
        assert!(outcome.summary.row_store.is_none());
        assert!(!config.database_path.exists());

        let validation = outcome.summary.validation.as_ref().unwrap();
        assert!(validation.check("header").unwrap().passed);
        assert!(validation.check("text_row_count").unwrap().passed);
        assert!(!validation.check("row_count").unwrap().passed);
        assert!(!validation.check("urls_stored").unwrap().passed);
    }

    #[tokio::test]
    async fn test_malformed_date_is_validation_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScrapeConfig {
            date_policy: DatePolicy::Strict,
            ..config_in(dir.path())
        };
        let html = ONE_ARTICLE.replace("Jan 5", "Feb 30");

        let outcome = run(&config, &StaticFetcher(html), 2024).await;

        let text_sink = outcome.summary.text_sink.as_ref().unwrap();
        assert_eq!(text_sink.written, 0);
        assert_eq!(text_sink.skipped.len(), 1);
        assert_eq!(stored_rows(&config.database_path)[0].3, "Feb 30");
        assert_eq!(outcome.exit_code(), 6);
    }
}
