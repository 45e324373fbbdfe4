//! JSON run summary.
//!
//! When `--summary-json` is given, the [`RunSummary`] of the run (batch,
//! per-sink reports, validation results) is serialized next to the sinks for
//! other tools to pick up.

use std::error::Error;
use std::path::Path;

use tokio::fs;
use tracing::{error, info, instrument};

use crate::run::RunSummary;

/// Write `summary` as pretty-printed JSON to `path`, creating parent
/// directories as needed.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_summary(summary: &RunSummary, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(summary)?;

    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create summary dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    info!("Wrote run summary");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_summary_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/summary.json");
        let summary = RunSummary {
            listing_url: "https://x/".to_string(),
            reference_year: 2024,
            ..RunSummary::default()
        };

        write_summary(&summary, &path).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["listing_url"], "https://x/");
        assert_eq!(value["reference_year"], 2024);
    }
}
