//! Command-line interface definitions.
//!
//! Every option is optional: with no arguments the tool extracts the default
//! listing page into the default text sink and database. Options can also be
//! supplied through environment variables.

use std::path::PathBuf;

use clap::Parser;

/// Extract a news front page into a text ledger and a SQLite table.
///
/// # Examples
///
/// ```sh
/// # Defaults
/// front_page_ledger
///
/// # Offline run against a saved snapshot
/// front_page_ledger --from-file ./snapshot.html --url https://techcrunch.com/
///
/// # Custom selectors and sinks
/// front_page_ledger --config ./site.yaml --database ./news.db
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML configuration file
    #[arg(short, long, env = "FRONT_PAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listing page URL (overrides the config file)
    #[arg(short, long, env = "FRONT_PAGE_URL")]
    pub url: Option<String>,

    /// Read the listing page from a saved HTML file instead of the network;
    /// relative links are still resolved against the listing URL
    #[arg(long)]
    pub from_file: Option<PathBuf>,

    /// Path of the delimited text sink
    #[arg(short, long)]
    pub text_sink: Option<PathBuf>,

    /// Path of the SQLite row store
    #[arg(short, long, env = "FRONT_PAGE_DB")]
    pub database: Option<PathBuf>,

    /// Write a JSON summary of the run to this path
    #[arg(long)]
    pub summary_json: Option<PathBuf>,
}
