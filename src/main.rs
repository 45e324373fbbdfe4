//! # Front Page Ledger
//!
//! Extracts article metadata (headline, author, publication date, URL) from a
//! news site's front page and records it in two places: a delimited text
//! ledger with normalized dates, and a SQLite table deduplicated by URL.
//!
//! ## Usage
//!
//! ```sh
//! front_page_ledger
//! front_page_ledger --config site.yaml --summary-json ./summary.json
//! ```
//!
//! ## Pipeline
//!
//! 1. **Extraction**: one navigation to the listing page, four fields per entry
//! 2. **Text sink**: header plus one `id | URL | "headline" | author | YYYY/M/D` line per record
//! 3. **Row store**: insert into `articles`, ignoring URLs already stored
//! 4. **Verification**: re-read both sinks and report any inconsistency
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 2 | Configuration error |
//! | 3 | Listing page could not be fetched or parsed |
//! | 4 | Text sink could not be written |
//! | 5 | Row store failure |
//! | 6 | Consistency check failed |

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dates;
mod error;
mod models;
mod outputs;
mod run;
mod scrapers;
mod utils;
mod verify;

use cli::Cli;
use config::ScrapeConfig;
use error::RunError;
use outputs::json;
use run::RunOutcome;
use scrapers::{FileFetcher, HttpFetcher};
use utils::current_year;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "front_page_ledger starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = match ScrapeConfig::resolve(&args).await {
        Ok(config) => config,
        Err(e) => {
            let err = RunError::from(e);
            error!(error = %err, "Configuration error");
            return ExitCode::from(err.exit_code());
        }
    };
    info!(
        url = %config.url,
        text_sink = %config.text_sink_path.display(),
        database = %config.database_path.display(),
        date_policy = ?config.date_policy,
        "Configuration resolved"
    );

    let reference_year = current_year();
    let outcome: RunOutcome = match &args.from_file {
        Some(path) => run::run(&config, &FileFetcher::new(path), reference_year).await,
        None => {
            let timeout = config.request_timeout_secs.map(Duration::from_secs);
            match HttpFetcher::new(&config.user_agent, timeout) {
                Ok(fetcher) => run::run(&config, &fetcher, reference_year).await,
                Err(e) => {
                    let err = RunError::from(e);
                    error!(error = %err, "Cannot create HTTP client");
                    return ExitCode::from(err.exit_code());
                }
            }
        }
    };

    if let Some(path) = &args.summary_json {
        if let Err(e) = json::write_summary(&outcome.summary, path).await {
            warn!(path = %path.display(), error = %e, "Failed to write run summary");
        }
    }

    for failure in &outcome.failures {
        if let RunError::Validation(mismatches) = failure {
            for mismatch in mismatches {
                warn!(%mismatch, "Discrepancy between sinks");
            }
        }
    }

    let code = outcome.exit_code();
    if code == 0 {
        info!("Execution complete");
    } else {
        error!(exit_code = code, errors = ?outcome.summary.errors, "Execution finished with failures");
    }
    ExitCode::from(code)
}
