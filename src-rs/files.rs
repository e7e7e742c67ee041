use crate::error::SnapshotError;
use crate::snapshot::{self, Snapshot};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};

pub const SNAPSHOT_EXT: &str = "liv2";
pub const CAPTURES_DIR: &str = "captures";
const TIMESTAMP_FORMAT: &str = "%Y.%m.%d_%H.%M";

/// Saves snapshot bytes to `<project>/captures/<name>_<yyyy.MM.dd_HH.mm>.liv2`.
///
/// `client_name` wins over `fallback_name` when non-empty.
pub fn save_to_file<Tz: TimeZone>(
    project_dir: &Path,
    client_name: Option<&str>,
    fallback_name: &str,
    data: &[u8],
    now: &DateTime<Tz>,
) -> Result<PathBuf>
where
    Tz::Offset: std::fmt::Display,
{
    let captures_dir = project_dir.join(CAPTURES_DIR);
    fs::create_dir_all(&captures_dir).with_context(|| {
        format!("failed to create captures directory: {}", captures_dir.display())
    })?;

    let file_name = suggested_name(client_name, fallback_name, now);
    let path = captures_dir.join(format!("{file_name}.{SNAPSHOT_EXT}"));
    fs::write(&path, data)
        .with_context(|| format!("failed to write snapshot: {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = data.len(), "saved snapshot");
    Ok(path)
}

pub fn save_to_file_now(
    project_dir: &Path,
    client_name: Option<&str>,
    fallback_name: &str,
    data: &[u8],
) -> Result<PathBuf> {
    save_to_file(project_dir, client_name, fallback_name, data, &Local::now())
}

pub fn suggested_name<Tz: TimeZone>(
    client_name: Option<&str>,
    fallback_name: &str,
    now: &DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let timestamp = now.format(TIMESTAMP_FORMAT);
    let base = client_name
        .filter(|name| !name.is_empty())
        .unwrap_or(fallback_name);
    sanitize_file_name(&format!("{base}_{timestamp}"))
}

/// Keeps only `[A-Za-z0-9._]`.
pub fn sanitize_file_name(input: &str) -> String {
    input
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_'))
        .collect()
}

pub fn read_snapshot_file(path: &Path) -> Result<Snapshot> {
    let bytes = fs::read(path)
        .map_err(SnapshotError::Read)
        .with_context(|| format!("snapshot not found: {}", path.display()))?;
    snapshot::decode(&bytes).with_context(|| format!("invalid snapshot: {}", path.display()))
}
