use whistle_core::PROTOCOL_VERSION;
use whistle_core::proto::{BackupStatus, DaemonStatus, LogLine, Request, Response};

use crate::client::{call, connect_only, connect_or_start};

pub async fn ping() -> anyhow::Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Request::Ping {
        client_version: env!("CARGO_PKG_VERSION").to_string(),
        protocol_version: PROTOCOL_VERSION,
    };

    match call(&mut framed, req).await? {
        Response::Pong { daemon_version, protocol_version } => {
            Ok(format!("pong: daemon={daemon_version} protocol={protocol_version}"))
        }
        other => Ok(format!("unexpected: {other:?}")),
    }
}

pub async fn status() -> anyhow::Result<(DaemonStatus, BackupStatus)> {
    let mut framed = connect_or_start().await?;
    match call(&mut framed, Request::Status {}).await? {
        Response::Status { daemon, backup } => Ok((daemon, backup)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn daemon_logs_tail(lines: usize) -> anyhow::Result<(Vec<LogLine>, bool)> {
    let mut framed = connect_only().await?;
    match call(&mut framed, Request::DaemonLogsTail { lines }).await? {
        Response::LogsTail { lines, truncated } => Ok((lines, truncated)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn shutdown() -> anyhow::Result<String> {
    let mut framed = connect_only().await?;
    match call(&mut framed, Request::Shutdown {}).await? {
        Response::ShutdownAck {} => Ok("Daemon acknowledged shutdown request.".to_string()),
        other => Ok(format!("unexpected: {other:?}")),
    }
}
