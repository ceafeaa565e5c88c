use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs;

use crate::error::BackupError;

pub const ARCHIVE_PREFIX: &str = "backup-";
pub const ARCHIVE_SUFFIX: &str = ".db";

/// Length of `YYYY-MM-DDTHH-MM`.
const STAMP_LEN: usize = 16;

/// Minute-precision UTC stamp used in archive names, e.g. `2024-05-01T03-00`.
///
/// Derived from the millisecond ISO-8601 rendering with `:` and `.` made
/// filename safe, then cut after the minutes.
pub fn archive_stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
        .chars()
        .take(STAMP_LEN)
        .collect()
}

pub fn archive_file_name(at: DateTime<Utc>) -> String {
    archive_name_for_stamp(&archive_stamp(at), 0)
}

/// Name for the `attempt`-th archive within the same minute. The first one
/// carries no suffix.
pub(crate) fn archive_name_for_stamp(stamp: &str, attempt: u32) -> String {
    if attempt == 0 {
        format!("{ARCHIVE_PREFIX}{stamp}{ARCHIVE_SUFFIX}")
    } else {
        format!("{ARCHIVE_PREFIX}{stamp}-{attempt}{ARCHIVE_SUFFIX}")
    }
}

/// Only names of this shape are ever considered for deletion.
pub fn is_archive_name(name: &str) -> bool {
    name.starts_with(ARCHIVE_PREFIX) && name.ends_with(ARCHIVE_SUFFIX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

/// Archive files in `dir`, oldest first. A missing directory has no archives.
pub async fn list_archives(dir: &Path) -> Result<Vec<ArchiveEntry>, BackupError> {
    let mut read = match fs::read_dir(dir).await {
        Ok(read) => read,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(BackupError::io("reading backup directory", dir, err)),
    };

    let mut entries = Vec::new();
    while let Some(entry) = read
        .next_entry()
        .await
        .map_err(|err| BackupError::io("reading backup directory", dir, err))?
    {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !is_archive_name(&name) {
            continue;
        }
        let path = entry.path();
        let meta = match entry.metadata().await {
            Ok(meta) => meta,
            // Swept between listing and stat.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(BackupError::io("reading archive metadata", &path, err)),
        };
        if !meta.is_file() {
            continue;
        }
        let modified = meta
            .modified()
            .map_err(|err| BackupError::io("reading archive mtime", &path, err))?;
        entries.push(ArchiveEntry {
            name,
            path,
            size_bytes: meta.len(),
            modified: modified.into(),
        });
    }

    entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));
    Ok(entries)
}
