#![allow(clippy::module_name_repetitions)]
//! Canonical locations for on-disk engine data.

use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "WAYPOINT_DATA_DIR";

/// Returns the data directory: `$WAYPOINT_DATA_DIR` if set and non-empty,
/// otherwise `data/` relative to the working directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    std::env::var(DATA_DIR_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .map_or_else(|| PathBuf::from("data"), PathBuf::from)
}

/// Returns the directory holding key-value records under `root`.
#[must_use]
pub fn store_dir(root: &Path) -> PathBuf {
    root.join("store")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !tokio::fs::try_exists(path).await? {
        tokio::fs::create_dir_all(path).await?;
    }
    Ok(())
}
