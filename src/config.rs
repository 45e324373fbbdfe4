//! Run configuration: listing URL, selectors, sink locations.
//!
//! Values come from built-in defaults, optionally replaced by a YAML file
//! (`--config`), then by command-line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::cli::Cli;
use crate::dates::DatePolicy;
use crate::error::ConfigError;

/// CSS selectors locating the four fields of each listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Selectors {
    /// One match per article on the listing page.
    pub item: String,
    /// Headline text, relative to an item.
    pub headline: String,
    /// Element carrying the article link in its `href`.
    pub link: String,
    /// Byline spans: the first holds the author, the second the date.
    pub byline: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            item: "div.post-block".to_string(),
            headline: "a.post-block__title__link".to_string(),
            link: "a.post-block__title__link".to_string(),
            byline: "div.river-byline span".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Listing page to extract from.
    pub url: String,
    pub selectors: Selectors,
    pub user_agent: String,
    /// Optional HTTP timeout; `None` waits indefinitely.
    pub request_timeout_secs: Option<u64>,
    pub text_sink_path: PathBuf,
    pub database_path: PathBuf,
    pub date_policy: DatePolicy,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            url: "https://techcrunch.com/".to_string(),
            selectors: Selectors::default(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_secs: None,
            text_sink_path: PathBuf::from("YYYY-MM-DD_frontpage.txt"),
            database_path: PathBuf::from("articles.db"),
            date_policy: DatePolicy::Strict,
        }
    }
}

impl ScrapeConfig {
    /// Parse a YAML document; missing keys keep their defaults.
    pub fn from_yaml(yaml: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_yaml(&yaml, path)?;
        info!("Loaded configuration");
        Ok(config)
    }

    /// Build the effective configuration for a command line.
    pub async fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path).await?,
            None => Self::default(),
        };
        config.apply_overrides(cli);
        Ok(config)
    }

    fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(url) = &cli.url {
            self.url = url.clone();
        }
        if let Some(path) = &cli.text_sink {
            self.text_sink_path = path.clone();
        }
        if let Some(path) = &cli.database {
            self.database_path = path.clone();
        }
    }
}
