//! JSON persistence for batch reports.
//!
//! One pretty-printed document per batch:
//!
//! ```text
//! output_dir/
//! └── news_digest_Tata_Motors_20250506_143000.json
//! ```

use crate::errors::OutputError;
use crate::models::BatchReport;
use crate::utils::{ensure_writable_dir, file_stem};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// `news_digest_{identifier}_{YYYYmmdd_HHMMSS}.json`, with spaces in the
/// identifier turned into underscores.
pub fn default_filename(identifier: &str, now: DateTime<Local>) -> String {
    let stem = file_stem(identifier);
    let stem = if stem.is_empty() { "urls".to_string() } else { stem };
    format!("news_digest_{stem}_{}.json", now.format("%Y%m%d_%H%M%S"))
}

/// Where a report goes: an explicit file, or the default name in `output_dir`.
pub fn output_path(explicit: Option<&Path>, output_dir: &Path, identifier: &str) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => output_dir.join(default_filename(identifier, Local::now())),
    }
}

/// Serialize `report` and write it to `path`, creating parent directories.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_report(report: &BatchReport, path: &Path) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(report)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_writable_dir(parent).await?;
    }

    fs::write(path, json).await.map_err(|source| OutputError::Write {
        path: path.display().to_string(),
        source,
    })?;
    info!(items = report.total_items, "Wrote JSON report");
    Ok(())
}
