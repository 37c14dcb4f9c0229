//! Unix domain socket set-up shared by the daemon and the client.
//!
//! On Linux a path starting with `@` names a socket in the abstract
//! namespace (see unix(7)). Those live outside the filesystem, are
//! world-connectable and vanish with the daemon.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tokio::net::{UnixListener, UnixStream};
use tracing::debug;

/// Whether `path` names an abstract socket.
pub fn is_abstract(path: &str) -> bool {
    cfg!(target_os = "linux") && path.len() > 1 && path.starts_with('@')
}

/// Binds the daemon socket.
///
/// A filesystem socket replaces any stale file at `path` and is chmod'ed to
/// `mode` so that every local user can connect.
pub fn bind(path: &str, mode: u32) -> io::Result<UnixListener> {
    if is_abstract(path) {
        return bind_abstract(&path[1..]);
    }

    match fs::remove_file(path) {
        Ok(()) => debug!(
            component = "transport",
            event = "stale_socket_removed",
            path,
            "removed stale socket"
        ),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let listener = UnixListener::bind(path)?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(listener)
}

/// Removes the socket file of a filesystem socket. Abstract sockets need no
/// cleanup.
pub fn unlink(path: &str) -> io::Result<()> {
    if is_abstract(path) || !Path::new(path).exists() {
        return Ok(());
    }
    fs::remove_file(path)
}

pub async fn connect(path: &str) -> io::Result<UnixStream> {
    if is_abstract(path) {
        return connect_abstract(&path[1..]);
    }
    UnixStream::connect(path).await
}

#[cfg(target_os = "linux")]
fn bind_abstract(name: &str) -> io::Result<UnixListener> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::{SocketAddr, UnixListener as StdUnixListener};

    let addr = SocketAddr::from_abstract_name(name.as_bytes())?;
    let listener = StdUnixListener::bind_addr(&addr)?;
    listener.set_nonblocking(true)?;
    UnixListener::from_std(listener)
}

#[cfg(target_os = "linux")]
fn connect_abstract(name: &str) -> io::Result<UnixStream> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::{SocketAddr, UnixStream as StdUnixStream};

    let addr = SocketAddr::from_abstract_name(name.as_bytes())?;
    let stream = StdUnixStream::connect_addr(&addr)?;
    stream.set_nonblocking(true)?;
    UnixStream::from_std(stream)
}

#[cfg(not(target_os = "linux"))]
fn bind_abstract(_name: &str) -> io::Result<UnixListener> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "abstract sockets require Linux"))
}

#[cfg(not(target_os = "linux"))]
fn connect_abstract(_name: &str) -> io::Result<UnixStream> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "abstract sockets require Linux"))
}
