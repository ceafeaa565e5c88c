use serde::{Deserialize, Serialize};

use super::{ArchiveInfo, BackupResult, BackupStatus, LogLine, RequestId, RpcError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: RequestId,
    pub payload: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Request {
    Ping { client_version: String, protocol_version: u32 },

    Status {},

    /// Run a backup now, bypassing the schedule.
    Backup {},

    ListArchives {},

    DaemonLogsTail { lines: usize },

    Shutdown {},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Response {
    Pong { daemon_version: String, protocol_version: u32 },

    Status { daemon: DaemonStatus, backup: BackupStatus },

    BackupFinished { result: BackupResult },

    Archives { entries: Vec<ArchiveInfo> },

    LogsTail { lines: Vec<LogLine>, truncated: bool },

    ShutdownAck {},

    Error(RpcError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub daemon_version: String,
    pub protocol_version: u32,
    pub pid: i32,
    pub uptime_ms: u64,
}
