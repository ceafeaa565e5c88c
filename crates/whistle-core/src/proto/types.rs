use serde::{Deserialize, Serialize};

use crate::RunMode;

pub type RequestId = u64;
pub type UnixMillis = u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub at_ms: UnixMillis,
    pub line: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupTrigger {
    Scheduled,
    Manual,
}

/// Wire form of one backup run's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", content = "data")]
pub enum BackupResult {
    Created {
        archive: String,
        swept: Vec<String>,
        sweep_failures: Vec<String>,
    },
    SkippedMissingSource {
        source: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRun {
    pub trigger: BackupTrigger,
    pub started_at_ms: UnixMillis,
    pub finished_at_ms: UnixMillis,
    pub result: BackupResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupStatus {
    pub run_mode: RunMode,
    pub scheduler_enabled: bool,
    pub schedule: String,
    pub next_run_ms: Option<UnixMillis>,
    pub database_path: String,
    pub backup_dir: String,
    pub retention_days: u64,
    pub last_run: Option<BackupRun>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveInfo {
    pub name: String,
    pub size_bytes: u64,
    pub modified_ms: UnixMillis,
}
