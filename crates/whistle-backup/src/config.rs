use std::path::PathBuf;
use std::time::Duration;

use whistle_core::{RunMode, parse_flag};

use crate::schedule::CronSchedule;

pub const RETENTION_DAYS: u64 = 30;

/// Archives strictly older than this are swept.
pub const RETENTION: Duration = Duration::from_millis(RETENTION_DAYS * 24 * 60 * 60 * 1000);

pub const DEFAULT_BACKUP_DIR: &str = "/app/backups";
pub const DEFAULT_DATABASE_PATH: &str = "/app/data/whistle.db";

/// Backup settings, resolved once at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Live database file that gets copied.
    pub database_path: PathBuf,

    /// Directory receiving `backup-*.db` archives.
    pub backup_dir: PathBuf,

    pub run_mode: RunMode,

    /// `ENABLE_BACKUPS`: schedule backups even outside production.
    pub force_enabled: bool,

    pub schedule: CronSchedule,
}

impl BackupConfig {
    pub fn new(database_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            backup_dir: backup_dir.into(),
            run_mode: RunMode::Development,
            force_enabled: false,
            schedule: CronSchedule::daily_backup(),
        }
    }

    pub fn run_mode(mut self, mode: RunMode) -> Self {
        self.run_mode = mode;
        self
    }

    pub fn force_enabled(mut self, enabled: bool) -> Self {
        self.force_enabled = enabled;
        self
    }

    /// Read `BACKUP_DIR`, `DATABASE_URL`, `NODE_ENV` and `ENABLE_BACKUPS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let backup_dir = lookup("BACKUP_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR));

        let database_path = lookup("DATABASE_URL")
            .and_then(|url| database_path_from_url(&url))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        Self::new(database_path, backup_dir)
            .run_mode(RunMode::from_env_value(lookup("NODE_ENV").as_deref()))
            .force_enabled(parse_flag(lookup("ENABLE_BACKUPS").as_deref()))
    }

    /// Production always schedules; other modes need the explicit override.
    pub fn scheduling_enabled(&self) -> bool {
        self.run_mode.is_production() || self.force_enabled
    }
}

/// Strip the `file:` scheme from a SQLite connection string.
/// Returns `None` when nothing usable is left.
pub fn database_path_from_url(url: &str) -> Option<PathBuf> {
    let url = url.trim();
    let path = url.strip_prefix("file:").unwrap_or(url);
    if path.is_empty() {
        return None;
    }
    Some(PathBuf::from(path))
}
