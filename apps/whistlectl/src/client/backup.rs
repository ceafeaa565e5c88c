use anyhow::Result;
use whistle_core::proto::{ArchiveInfo, BackupResult, Request, Response};

use crate::client::{call, connect_or_start};

pub async fn backup_now() -> Result<BackupResult> {
    let mut framed = connect_or_start().await?;
    match call(&mut framed, Request::Backup {}).await? {
        Response::BackupFinished { result } => Ok(result),
        other => Err(anyhow::anyhow!("unexpected response: {:?}", other)),
    }
}

pub async fn list_archives() -> Result<Vec<ArchiveInfo>> {
    let mut framed = connect_or_start().await?;
    match call(&mut framed, Request::ListArchives {}).await? {
        Response::Archives { entries } => Ok(entries),
        other => Err(anyhow::anyhow!("unexpected response: {:?}", other)),
    }
}
