use std::io::{self, ErrorKind};
use std::path::Path;

use tokio::net::{UnixListener, UnixStream};

pub async fn connect(path: &Path) -> io::Result<UnixStream> {
    UnixStream::connect(path).await
}

/// Bind the daemon socket at `path`.
///
/// A socket file nobody answers on is a leftover from a crashed daemon and
/// gets replaced. Fails with `AddrInUse` while another daemon still serves
/// it.
pub async fn listen(path: &Path) -> io::Result<UnixListener> {
    if UnixStream::connect(path).await.is_ok() {
        return Err(io::Error::new(
            ErrorKind::AddrInUse,
            format!("a daemon is already serving {}", path.display()),
        ));
    }
    remove_socket(path)?;
    UnixListener::bind(path)
}

/// Remove the socket file. Already gone is fine.
pub fn remove_socket(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
