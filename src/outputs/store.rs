//! SQLite row store.
//!
//! The `articles` table is keyed by URL: the schema carries a uniqueness
//! constraint and inserts that hit it are ignored, so re-running over the same
//! front page does not add rows. The `date` column stores the date exactly as
//! printed on the page; only the text sink holds the normalized form.
//!
//! A [`RowStore`] owns its connection for the whole run. It is passed by
//! reference to the writer and the checker and closed once, when dropped or
//! through [`RowStore::close`].

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::error::StoreError;
use crate::models::ArticleRecord;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS articles (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        url      TEXT NOT NULL UNIQUE,
        headline TEXT,
        author   TEXT,
        date     TEXT
    );
    -- Tables created without the column constraint get uniqueness here.
    -- On a fresh table this duplicates the implicit index of `UNIQUE`.
    CREATE UNIQUE INDEX IF NOT EXISTS idx_articles_url ON articles(url);
";

const INSERT: &str = "INSERT INTO articles (url, headline, author, date)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT(url) DO NOTHING";

/// What happened to one record on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same URL already existed.
    Duplicate,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    /// Position of the record in the batch.
    pub index: usize,
    pub url: String,
    pub outcome: InsertOutcome,
}

/// Per-record result of one [`RowStore::persist`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreReport {
    pub outcomes: Vec<RecordOutcome>,
}

impl StoreReport {
    pub fn inserted(&self) -> usize {
        self.count(|o| matches!(o, InsertOutcome::Inserted))
    }

    pub fn duplicates(&self) -> usize {
        self.count(|o| matches!(o, InsertOutcome::Duplicate))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, InsertOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&InsertOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|r| pred(&r.outcome)).count()
    }
}

pub struct RowStore {
    conn: Connection,
    path: PathBuf,
}

impl RowStore {
    /// Open (or create) the database file at `path`.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Opened row store");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the `articles` table if it is absent.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(SCHEMA)
            .map_err(StoreError::Schema)?;
        debug!("articles table ready");
        Ok(())
    }

    /// Total number of stored rows.
    pub fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn contains_url(&self, url: &str) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM articles WHERE url = ?1", [url], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert every record inside one transaction.
    ///
    /// A failing insert is recorded in the report and does not stop the
    /// remaining ones; the transaction commits whatever succeeded.
    ///
    /// # Errors
    ///
    /// Fails only if the transaction cannot be started or committed, or the
    /// insert statement cannot be prepared.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), records = records.len()))]
    pub fn persist(&mut self, records: &[ArticleRecord]) -> Result<StoreReport, StoreError> {
        let tx = self.conn.transaction().map_err(StoreError::Transaction)?;
        let mut report = StoreReport::default();
        {
            let mut stmt = tx.prepare(INSERT)?;
            for (index, record) in records.iter().enumerate() {
                let outcome = match stmt.execute(params![
                    record.url,
                    record.headline,
                    record.author,
                    record.raw_date,
                ]) {
                    Ok(0) => {
                        debug!(index, url = %record.url, "URL already stored");
                        InsertOutcome::Duplicate
                    }
                    Ok(_) => InsertOutcome::Inserted,
                    Err(e) => {
                        error!(index, url = %record.url, error = %e, "Insert failed");
                        InsertOutcome::Failed(e.to_string())
                    }
                };
                report.outcomes.push(RecordOutcome {
                    index,
                    url: record.url.clone(),
                    outcome,
                });
            }
        }
        tx.commit().map_err(StoreError::Transaction)?;

        info!(
            inserted = report.inserted(),
            duplicates = report.duplicates(),
            failed = report.failed(),
            "Persisted batch to row store"
        );
        Ok(report)
    }

    /// Close the connection, surfacing any error from SQLite.
    pub fn close(self) -> Result<(), StoreError> {
        let path = self.path;
        self.conn
            .close()
            .map_err(|(_, e)| StoreError::Query(e))?;
        debug!(path = %path.display(), "Closed row store");
        Ok(())
    }
}
