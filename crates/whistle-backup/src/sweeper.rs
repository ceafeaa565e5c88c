use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::archive::is_archive_name;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Archive-shaped entries looked at.
    pub examined: usize,
    pub deleted: Vec<String>,
    pub failed: Vec<SweepFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub name: String,
    pub error: String,
}

/// True when the archive's age is strictly greater than `retention`,
/// compared at millisecond resolution. An mtime in the future counts as age 0.
pub fn is_expired(modified: SystemTime, now: SystemTime, retention: Duration) -> bool {
    let age = now.duration_since(modified).unwrap_or_default();
    age.as_millis() > retention.as_millis()
}

/// Delete archives in `dir` older than `retention`.
///
/// Best effort: each entry is handled on its own and a failure on one is
/// logged and recorded without stopping the rest. Entries whose names don't
/// look like archives are never touched.
pub async fn sweep_expired(dir: &Path, retention: Duration, now: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();

    let mut read = match fs::read_dir(dir).await {
        Ok(read) => read,
        Err(err) => {
            error!("failed to clean up old backups in {}: {}", dir.display(), err);
            return report;
        }
    };

    loop {
        let entry = match read.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                error!("failed to read backup directory {}: {}", dir.display(), err);
                break;
            }
        };

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !is_archive_name(name) {
            continue;
        }
        report.examined += 1;

        let path = entry.path();
        let modified = match fs::metadata(&path).await.and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("backup {} vanished before it could be checked", name);
                continue;
            }
            Err(err) => {
                warn!("failed to stat backup {}: {}", name, err);
                report.failed.push(SweepFailure {
                    name: name.to_string(),
                    error: err.to_string(),
                });
                continue;
            }
        };

        if !is_expired(modified, now, retention) {
            continue;
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("deleted old backup: {}", name);
                report.deleted.push(name.to_string());
            }
            // Another sweep got there first.
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("old backup {} already removed", name);
            }
            Err(err) => {
                error!("failed to delete old backup {}: {}", name, err);
                report.failed.push(SweepFailure {
                    name: name.to_string(),
                    error: err.to_string(),
                });
            }
        }
    }

    report
}
