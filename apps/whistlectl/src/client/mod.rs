pub mod backup;
mod commands;

use std::time::Duration;
use tokio::process::Command;
use whistle_core::proto::{Envelope, Request, Response};
use whistle_ipc::framing::{self, FramedStream};
use whistle_utils::{ensure_dir, runtime_paths};

pub use commands::core::{daemon_logs_tail, ping, shutdown, status};

pub(crate) async fn connect_or_start() -> anyhow::Result<FramedStream> {
    let paths = runtime_paths();
    ensure_dir(&paths.runtime_dir)?;

    if let Ok(stream) = whistle_ipc::socket::connect(&paths.socket_path).await {
        return Ok(framing::framed(stream));
    }

    start_daemon_detached().await?;

    for _ in 0..30 {
        if let Ok(stream) = whistle_ipc::socket::connect(&paths.socket_path).await {
            return Ok(framing::framed(stream));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    anyhow::bail!("failed to connect to whistled after starting it");
}

pub(crate) async fn connect_only() -> anyhow::Result<FramedStream> {
    let paths = runtime_paths();
    whistle_ipc::socket::connect(&paths.socket_path)
        .await
        .map(framing::framed)
        .map_err(|err| anyhow::anyhow!("whistled is not running ({err})"))
}

/// One request, one response. Daemon-side errors become `Err`.
pub(crate) async fn call(framed: &mut FramedStream, payload: Request) -> anyhow::Result<Response> {
    framing::send_request(framed, &Envelope { id: 1, payload }).await?;
    let resp = framing::read_response(framed).await?;
    match resp.payload {
        Response::Error(err) => Err(anyhow::anyhow!("{:?}: {}", err.code, err.message)),
        other => Ok(other),
    }
}

async fn start_daemon_detached() -> anyhow::Result<()> {
    // Dev: run an arbitrary command via shell
    //   WHISTLED_CMD='cargo run -p whistled' cargo run -p whistlectl -- ping
    if let Ok(cmd) = std::env::var("WHISTLED_CMD") {
        Command::new("sh")
            .arg("-lc")
            .arg(cmd)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()?;
        return Ok(());
    }

    // Explicit binary path
    //   WHISTLED_PATH=target/debug/whistled cargo run -p whistlectl -- status
    if let Ok(path) = std::env::var("WHISTLED_PATH") {
        Command::new(path)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()?;
        return Ok(());
    }

    Command::new("whistled")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;

    Ok(())
}
