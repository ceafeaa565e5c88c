mod convert;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::net::UnixListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use whistle_backup::{BackupService, RETENTION_DAYS, SchedulerHandle, list_archives};
use whistle_core::proto::*;
use whistle_core::{CoreError, PROTOCOL_VERSION};
use whistle_ipc::framing;
use whistle_utils::now_millis;

use crate::logs::LogStore;

/// Everything a connection handler needs. Shared across connections.
pub struct DaemonContext {
    service: BackupService,
    scheduler: Mutex<Option<SchedulerHandle>>,
    logs: LogStore,
    started_ms: u64,
    shutdown: watch::Sender<bool>,
}

impl DaemonContext {
    pub fn new(service: BackupService, scheduler: Option<SchedulerHandle>, logs: LogStore) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            service,
            scheduler: Mutex::new(scheduler),
            logs,
            started_ms: now_millis(),
            shutdown,
        }
    }

    fn stop_scheduler(&self) {
        let handle = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            info!("stopping backup scheduler");
            handle.stop();
        }
    }

    fn backup_status(&self) -> BackupStatus {
        let config = self.service.config();
        let next_run_ms = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(SchedulerHandle::next_fire)
            .map(convert::millis);

        BackupStatus {
            run_mode: config.run_mode,
            scheduler_enabled: config.scheduling_enabled(),
            schedule: config.schedule.to_string(),
            next_run_ms,
            database_path: config.database_path.display().to_string(),
            backup_dir: config.backup_dir.display().to_string(),
            retention_days: RETENTION_DAYS,
            last_run: self.service.last_run().as_ref().map(convert::backup_run),
        }
    }
}

pub async fn serve(listener: UnixListener, ctx: Arc<DaemonContext>) -> std::io::Result<()> {
    let mut shutdown_rx = ctx.shutdown.subscribe();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _addr) = accepted?;
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    if let Err(err) = handle_conn(stream, ctx).await {
                        debug!("connection closed with error: {}", err);
                    }
                });
            }
            _ = shutdown_rx.changed() => {
                info!("shutdown requested");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                break;
            }
        }
    }

    ctx.stop_scheduler();
    Ok(())
}

async fn handle_conn(stream: tokio::net::UnixStream, ctx: Arc<DaemonContext>) -> std::io::Result<()> {
    let mut framed = framing::framed(stream);

    while let Some(req_env) = framing::read_request(&mut framed).await? {
        let req_id = req_env.id;
        let is_shutdown = matches!(req_env.payload, Request::Shutdown {});

        let payload = handle_request(&ctx, req_env.payload).await;
        framing::send_response(&mut framed, &Envelope { id: req_id, payload }).await?;

        if is_shutdown {
            ctx.shutdown.send_replace(true);
            break;
        }
    }

    Ok(())
}

async fn handle_request(ctx: &DaemonContext, request: Request) -> Response {
    match request {
        Request::Ping { client_version, protocol_version } => {
            if protocol_version != PROTOCOL_VERSION {
                warn!(
                    "client {} speaks protocol {}, daemon speaks {}",
                    client_version, protocol_version, PROTOCOL_VERSION
                );
                return Response::Error(
                    CoreError::UnsupportedProtocol {
                        client: protocol_version,
                        daemon: PROTOCOL_VERSION,
                    }
                    .into(),
                );
            }
            Response::Pong {
                daemon_version: env!("CARGO_PKG_VERSION").to_string(),
                protocol_version: PROTOCOL_VERSION,
            }
        }

        Request::Status {} => Response::Status {
            daemon: DaemonStatus {
                daemon_version: env!("CARGO_PKG_VERSION").to_string(),
                protocol_version: PROTOCOL_VERSION,
                pid: std::process::id() as i32,
                uptime_ms: now_millis().saturating_sub(ctx.started_ms),
            },
            backup: ctx.backup_status(),
        },

        Request::Backup {} => {
            let outcome = ctx.service.trigger_backup().await;
            Response::BackupFinished {
                result: convert::backup_result(&outcome),
            }
        }

        Request::ListArchives {} => match list_archives(&ctx.service.config().backup_dir).await {
            Ok(entries) => Response::Archives {
                entries: entries.iter().map(convert::archive_info).collect(),
            },
            Err(err) => Response::Error(convert::backup_error(err).into()),
        },

        Request::DaemonLogsTail { lines } => {
            let (lines, truncated) = ctx.logs.tail(lines);
            Response::LogsTail { lines, truncated }
        }

        Request::Shutdown {} => Response::ShutdownAck {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whistle_backup::BackupConfig;

    fn context(tmp: &tempfile::TempDir) -> Arc<DaemonContext> {
        let config = BackupConfig::new(tmp.path().join("whistle.db"), tmp.path().join("backups"));
        let service = BackupService::new(Arc::new(config));
        Arc::new(DaemonContext::new(service, None, LogStore::new(100)))
    }

    #[tokio::test]
    async fn ping_rejects_other_protocol_versions() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);

        let ok = handle_request(
            &ctx,
            Request::Ping { client_version: "t".into(), protocol_version: PROTOCOL_VERSION },
        )
        .await;
        assert!(matches!(ok, Response::Pong { .. }));

        let bad = handle_request(
            &ctx,
            Request::Ping { client_version: "t".into(), protocol_version: PROTOCOL_VERSION + 1 },
        )
        .await;
        match bad {
            Response::Error(err) => assert_eq!(err.code, ErrorCode::UnsupportedProtocol),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn manual_backup_then_listing_and_status() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("whistle.db"), b"reports").unwrap();
        let ctx = context(&tmp);

        match handle_request(&ctx, Request::Backup {}).await {
            Response::BackupFinished { result: BackupResult::Created { archive, swept, .. } } => {
                assert!(archive.contains("backup-"));
                assert!(swept.is_empty());
            }
            other => panic!("unexpected response: {other:?}"),
        }

        match handle_request(&ctx, Request::ListArchives {}).await {
            Response::Archives { entries } => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].size_bytes, 7);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        match handle_request(&ctx, Request::Status {}).await {
            Response::Status { backup, .. } => {
                assert!(!backup.scheduler_enabled);
                assert_eq!(backup.next_run_ms, None);
                assert_eq!(backup.schedule, "0 3 * * *");
                assert_eq!(backup.retention_days, 30);
                let last = backup.last_run.expect("last run reported");
                assert_eq!(last.trigger, BackupTrigger::Manual);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn backup_without_database_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        match handle_request(&ctx, Request::Backup {}).await {
            Response::BackupFinished { result } => {
                assert!(matches!(result, BackupResult::SkippedMissingSource { .. }))
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreadable_backup_dir_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("backups"), b"not a directory").unwrap();
        let ctx = context(&tmp);
        match handle_request(&ctx, Request::ListArchives {}).await {
            Response::Error(err) => {
                assert_eq!(err.code, ErrorCode::IoError);
                assert_eq!(
                    err.details.get("context").map(String::as_str),
                    Some("reading backup directory")
                );
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn shutdown_over_the_socket_stops_serving() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp);
        let (client, server) = tokio::net::UnixStream::pair().unwrap();

        let conn = tokio::spawn(handle_conn(server, Arc::clone(&ctx)));
        let mut framed = framing::framed(client);
        let mut shutdown = ctx.shutdown.subscribe();

        framing::send_request(&mut framed, &Envelope { id: 9, payload: Request::Shutdown {} })
            .await
            .unwrap();
        let resp = framing::read_response(&mut framed).await.unwrap();
        assert_eq!(resp.id, 9);
        assert!(matches!(resp.payload, Response::ShutdownAck {}));

        shutdown.changed().await.unwrap();
        assert!(*shutdown.borrow());
        conn.await.unwrap().unwrap();
    }
}
