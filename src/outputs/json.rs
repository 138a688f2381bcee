//! JSON output files for reports and predictions.
//!
//! Files are organized by date with edition names:
//! ```text
//! output_dir/
//! └── 2025-05-06/
//!     ├── kenya_morning.json
//!     └── predictions_nse_evening.json
//! ```

use crate::utils::{ensure_writable_dir, time_of_day};
use chrono::Local;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument};

/// Lowercase `name` and replace anything but ASCII alphanumerics with `_`.
pub fn file_stem(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Path of the file for `name` in today's directory for the given edition.
pub fn output_path(output_dir: &str, date: &str, name: &str, edition: &str) -> PathBuf {
    PathBuf::from(output_dir)
        .join(date)
        .join(format!("{}_{}.json", file_stem(name), edition))
}

/// Serialize `value` as pretty JSON under `{output_dir}/{date}/{name}_{edition}.json`.
///
/// Returns the path written.
#[instrument(level = "info", skip_all, fields(%output_dir, %name))]
pub async fn write_json<T: Serialize>(
    value: &T,
    output_dir: &str,
    name: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;
    let date = Local::now().date_naive().to_string();
    let path = output_path(output_dir, &date, name, &time_of_day());

    if let Some(dir) = path.parent() {
        ensure_writable_dir(&dir.to_string_lossy()).await?;
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote JSON output");
    Ok(path)
}
