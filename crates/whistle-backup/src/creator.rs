use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::archive::{archive_name_for_stamp, archive_stamp};
use crate::clock::Clock;
use crate::config::{BackupConfig, RETENTION};
use crate::error::BackupError;
use crate::sweeper::{SweepReport, sweep_expired};

/// Suffixes tried when several archives land in the same minute.
const MAX_NAME_ATTEMPTS: u32 = 1000;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Result of one backup run. Never an error: failures are already logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Created { archive: PathBuf, sweep: SweepReport },
    SkippedMissingSource { source: PathBuf },
    Failed { error: String },
}

impl BackupOutcome {
    pub fn archive(&self) -> Option<&Path> {
        match self {
            BackupOutcome::Created { archive, .. } => Some(archive),
            _ => None,
        }
    }
}

/// Copy the database into a new archive, then sweep expired ones.
///
/// A missing database is not an error ("nothing to back up yet"). Any I/O
/// failure is logged and swallowed so a backup can never take the host
/// process down.
pub async fn create_backup(config: &BackupConfig, clock: &dyn Clock) -> BackupOutcome {
    match try_create_backup(config, clock).await {
        Ok(Some(archive)) => {
            info!("backup created: {}", archive.display());
            let now = clock.now();
            let sweep = sweep_expired(&config.backup_dir, RETENTION, now.into()).await;
            BackupOutcome::Created { archive, sweep }
        }
        Ok(None) => {
            info!(
                "database file not found at {}, skipping backup",
                config.database_path.display()
            );
            BackupOutcome::SkippedMissingSource {
                source: config.database_path.clone(),
            }
        }
        Err(err) => {
            error!("failed to create backup: {}", err);
            BackupOutcome::Failed {
                error: err.to_string(),
            }
        }
    }
}

async fn try_create_backup(
    config: &BackupConfig,
    clock: &dyn Clock,
) -> Result<Option<PathBuf>, BackupError> {
    let dir = &config.backup_dir;
    fs::create_dir_all(dir)
        .await
        .map_err(|err| BackupError::io("creating backup directory", dir, err))?;

    let source = &config.database_path;
    let exists = fs::try_exists(source)
        .await
        .map_err(|err| BackupError::io("checking database file", source, err))?;
    if !exists {
        return Ok(None);
    }

    let stamp = archive_stamp(clock.now());

    // Copy under a hidden name first so a half-written file never looks like
    // an archive to the sweeper or to a restore.
    let tmp = dir.join(format!(
        ".backup-{}.{}-{}.tmp",
        stamp,
        std::process::id(),
        TMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    if let Err(err) = fs::copy(source, &tmp).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(BackupError::io("copying database file", source, err));
    }

    let claimed = claim_archive_name(&tmp, dir, &stamp, true).await;
    let _ = fs::remove_file(&tmp).await;
    claimed.map(Some)
}

/// Publish `tmp` under the first free archive name for `stamp`. Hard links
/// never replace an existing file, so overlapping runs each keep their own
/// archive. Filesystems without hard links get a `create_new` copy instead.
async fn claim_archive_name(
    tmp: &Path,
    dir: &Path,
    stamp: &str,
    mut use_links: bool,
) -> Result<PathBuf, BackupError> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let target = dir.join(archive_name_for_stamp(stamp, attempt));
        let published = if use_links {
            match fs::hard_link(tmp, &target).await {
                Err(err) if links_unsupported(err.kind()) => {
                    debug!("hard links unavailable in {} ({}), copying", dir.display(), err);
                    use_links = false;
                    copy_new(tmp, &target).await
                }
                other => other,
            }
        } else {
            copy_new(tmp, &target).await
        };

        match published {
            Ok(()) => return Ok(target),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(BackupError::io("publishing archive", &target, err)),
        }
    }
    Err(BackupError::NamesExhausted(stamp.to_string()))
}

/// exFAT and some network mounts refuse `link(2)` with one of these.
fn links_unsupported(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Unsupported | ErrorKind::PermissionDenied)
}

/// Copy `src` to `target`, failing with `AlreadyExists` instead of
/// overwriting. A partial target is removed.
async fn copy_new(src: &Path, target: &Path) -> std::io::Result<()> {
    let mut out = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .await?;
    let copied = async {
        let mut input = fs::File::open(src).await?;
        tokio::io::copy(&mut input, &mut out).await?;
        out.flush().await
    }
    .await;
    if copied.is_err() {
        drop(out);
        let _ = fs::remove_file(target).await;
    }
    copied
}
