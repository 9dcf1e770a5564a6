//! Small helpers for log output, file naming and the file system.

use crate::errors::OutputError;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and the number
/// of dropped characters appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 chars)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max).collect();
        format!("{kept}…(+{} chars)", total - max)
    }
}

/// Make a search identifier safe to embed in a file name.
///
/// Whitespace runs become `_`; path separators and other characters file
/// systems reject are dropped.
pub fn file_stem(identifier: &str) -> String {
    identifier
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), OutputError> {
    let directory_error = |source| OutputError::Directory {
        path: path.display().to_string(),
        source,
    };
    fs::create_dir_all(path).await.map_err(directory_error)?;

    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path).map_err(directory_error)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}
