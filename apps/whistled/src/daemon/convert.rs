use chrono::{DateTime, Utc};
use whistle_backup::{ArchiveEntry, BackupError, BackupOutcome, RunRecord, Trigger};
use whistle_core::CoreError;
use whistle_core::proto::{ArchiveInfo, BackupResult, BackupRun, BackupTrigger, UnixMillis};

pub fn millis(at: DateTime<Utc>) -> UnixMillis {
    at.timestamp_millis().max(0) as UnixMillis
}

pub fn backup_result(outcome: &BackupOutcome) -> BackupResult {
    match outcome {
        BackupOutcome::Created { archive, sweep } => BackupResult::Created {
            archive: archive.display().to_string(),
            swept: sweep.deleted.clone(),
            sweep_failures: sweep
                .failed
                .iter()
                .map(|f| format!("{}: {}", f.name, f.error))
                .collect(),
        },
        BackupOutcome::SkippedMissingSource { source } => BackupResult::SkippedMissingSource {
            source: source.display().to_string(),
        },
        BackupOutcome::Failed { error } => BackupResult::Failed { error: error.clone() },
    }
}

pub fn backup_run(record: &RunRecord) -> BackupRun {
    BackupRun {
        trigger: match record.trigger {
            Trigger::Scheduled => BackupTrigger::Scheduled,
            Trigger::Manual => BackupTrigger::Manual,
        },
        started_at_ms: millis(record.started_at),
        finished_at_ms: millis(record.finished_at),
        result: backup_result(&record.outcome),
    }
}

pub fn archive_info(entry: &ArchiveEntry) -> ArchiveInfo {
    ArchiveInfo {
        name: entry.name.clone(),
        size_bytes: entry.size_bytes,
        modified_ms: millis(entry.modified),
    }
}

pub fn backup_error(err: BackupError) -> CoreError {
    match err {
        BackupError::Io { context, source, .. } => CoreError::io(context, source),
        other => CoreError::Internal(other.to_string()),
    }
}
