//! TCP and UNIX domain socket listeners
//!
//! The socket file of a UNIX listener is made world accessible so a proxy
//! running as another user can connect, and is removed again on shutdown.

use ldapgate_core::{Error, ListenTarget, Result};
use std::fmt;
use std::fs::{self, Permissions};
use std::io;
use std::net::SocketAddr;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::Path;
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tracing::{debug, error, info};

/// Peer address of a connection; unknown for UNIX sockets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientAddr(pub Option<SocketAddr>);

impl From<SocketAddr> for ClientAddr {
    fn from(addr: SocketAddr) -> Self {
        Self(Some(addr))
    }
}

impl fmt::Display for ClientAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(addr) => write!(f, "{}", addr.ip()),
            None => f.write_str("-"),
        }
    }
}

/// An accepted connection
pub enum Connection {
    Tcp(TcpStream, SocketAddr),
    Unix(UnixStream),
}

pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    pub async fn bind(target: &ListenTarget) -> Result<Self> {
        match target {
            ListenTarget::Tcp { host, port } => TcpListener::bind((host.as_str(), *port))
                .await
                .map(Listener::Tcp)
                .map_err(|e| Error::Listen(format!("failed to bind {}: {}", target, e))),
            ListenTarget::Unix(path) => {
                remove_stale_socket(path)?;
                let listener = UnixListener::bind(path)
                    .map_err(|e| Error::Listen(format!("failed to bind {}: {}", target, e)))?;
                fs::set_permissions(path, Permissions::from_mode(0o777))?;
                Ok(Listener::Unix(listener))
            }
        }
    }

    pub async fn accept(&self) -> io::Result<Connection> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                Ok(Connection::Tcp(stream, addr))
            }
            Listener::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok(Connection::Unix(stream))
            }
        }
    }

    /// Bound TCP address, useful when listening on port 0
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Listener::Tcp(listener) => listener.local_addr().ok(),
            Listener::Unix(_) => None,
        }
    }
}

/// Remove the socket file of `target`, if it has one
pub fn cleanup(target: &ListenTarget) {
    if let Some(path) = target.socket_path() {
        match fs::remove_file(path) {
            Ok(()) => info!("Removed socket \"{}\"", path.display()),
            Err(e) => error!("Failed to remove socket \"{}\": {}", path.display(), e),
        }
    }
}

/// A socket left behind by a previous run would make bind fail
fn remove_stale_socket(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            debug!("deleting old socket: {}", path.display());
            fs::remove_file(path)?;
            Ok(())
        }
        Ok(_) => Err(Error::Listen(format!(
            "{} exists and is not a socket",
            path.display()
        ))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unix_socket_is_world_accessible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.sock");
        let target = ListenTarget::Unix(path.clone());

        let _listener = Listener::bind(&target).await.unwrap();

        let meta = fs::symlink_metadata(&path).unwrap();
        assert!(meta.file_type().is_socket());
        assert_eq!(meta.permissions().mode() & 0o777, 0o777);
    }

    #[tokio::test]
    async fn test_stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.sock");
        let target = ListenTarget::Unix(path.clone());

        // dropping a listener leaves its socket file behind
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        assert!(Listener::bind(&target).await.is_ok());
    }

    #[tokio::test]
    async fn test_regular_file_is_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.sock");
        fs::write(&path, b"keep me").unwrap();

        let result = Listener::bind(&ListenTarget::Unix(path.clone())).await;

        assert!(matches!(result, Err(Error::Listen(_))));
        assert_eq!(fs::read(&path).unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn test_cleanup_removes_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.sock");
        let target = ListenTarget::Unix(path.clone());

        let listener = Listener::bind(&target).await.unwrap();
        drop(listener);
        cleanup(&target);

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_tcp_listener_reports_address() {
        let target = ListenTarget::Tcp {
            host: "127.0.0.1".into(),
            port: 0,
        };

        let listener = Listener::bind(&target).await.unwrap();
        let addr = listener.local_addr().unwrap();

        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn test_client_addr_display() {
        let addr: SocketAddr = "192.0.2.10:40000".parse().unwrap();
        assert_eq!(ClientAddr::from(addr).to_string(), "192.0.2.10");
        assert_eq!(ClientAddr::default().to_string(), "-");
    }
}
