//! Small helpers shared by the pipeline stages.
//!
//! - Reference year for date normalization
//! - String truncation for log fields
//! - Early writability check for sink locations

use std::path::Path;

use chrono::{Datelike, Local};
use tokio::fs;
use tracing::{debug, info, instrument};

/// The calendar year used to complete year-less listing dates.
pub fn current_year() -> i32 {
    let year = Local::now().year();
    debug!(year, "Computed reference year");
    year
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary)
/// with the number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let cut = s
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max)
        .last()
        .unwrap_or(0);
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure the directory that will hold `path` exists and accepts writes.
///
/// Creates missing parent directories, then creates and removes a probe
/// file next to the target.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_parent(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).await?;

    let probe = parent.join("..__probe_write__");
    fs::File::create(&probe).await?;
    let _ = fs::remove_file(&probe).await;
    info!(dir = %parent.display(), "Output directory is writable");
    Ok(())
}
