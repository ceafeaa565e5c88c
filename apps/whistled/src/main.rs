use std::sync::Arc;

use tracing::{info, warn};

use whistle_backup::{BackupConfig, BackupService, init_backup_scheduler};
use whistle_utils::{ensure_dir, runtime_paths};

mod daemon;
mod lock;
mod logs;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let logs = logs::LogStore::new(2000);
    tracing_subscriber::fmt().with_writer(logs.writer()).init();

    let paths = runtime_paths();
    ensure_dir(&paths.runtime_dir)?;

    // single-instance lock
    let _guard = match lock::acquire_lock(&paths.lock_path) {
        Ok(guard) => guard,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
            warn!("daemon already running (lock held), exiting");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let listener = match whistle_ipc::socket::listen(&paths.socket_path).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            warn!("daemon already running (socket alive), exiting");
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    info!("whistled listening at {:?}", paths.socket_path);

    let config = Arc::new(BackupConfig::from_env());
    info!(
        "backing up {} into {} (mode {:?}, override {})",
        config.database_path.display(),
        config.backup_dir.display(),
        config.run_mode,
        config.force_enabled
    );

    let service = BackupService::new(config);
    let scheduler = init_backup_scheduler(&service);

    let ctx = Arc::new(daemon::DaemonContext::new(service, scheduler, logs));
    let result = daemon::serve(listener, ctx).await;

    if let Err(err) = whistle_ipc::socket::remove_socket(&paths.socket_path) {
        warn!("failed to remove socket {:?}: {}", paths.socket_path, err);
    }
    result
}
