use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Held for the daemon's lifetime; the OS drops the lock when the file closes.
pub struct LockGuard {
    _file: File,
}

/// Take the single-instance lock. Fails with `WouldBlock` when another
/// daemon already holds it.
pub fn acquire_lock(path: &Path) -> std::io::Result<LockGuard> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)?;

    file.try_lock_exclusive()?;
    Ok(LockGuard { _file: file })
}
