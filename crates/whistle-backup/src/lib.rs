//! Scheduled backups of the application's SQLite store.
//!
//! A run copies the live database file into the backup directory under a
//! timestamped `backup-<stamp>.db` name and then sweeps archives older than
//! the retention threshold. Runs are fire-and-forget: every failure is logged
//! and reported as a [`BackupOutcome`], never raised to the caller.

pub mod archive;
pub mod clock;
pub mod config;
pub mod creator;
pub mod error;
pub mod schedule;
pub mod scheduler;
pub mod service;
pub mod sweeper;

#[cfg(test)]
mod testing;

pub use archive::{ArchiveEntry, archive_file_name, is_archive_name, list_archives};
pub use clock::{Clock, SystemClock};
pub use config::{BackupConfig, RETENTION, RETENTION_DAYS};
pub use creator::{BackupOutcome, create_backup};
pub use error::{BackupError, CronError};
pub use schedule::CronSchedule;
pub use scheduler::{SchedulerHandle, init_backup_scheduler};
pub use service::{BackupService, RunRecord, Trigger};
pub use sweeper::{SweepFailure, SweepReport, sweep_expired};
