//! Unix domain socket plumbing
//!
//! The client side connects with tokio's non-blocking connect, which waits on
//! socket readiness instead of polling. The listening side (only used by the
//! mock peer) goes through the interprocess crate.

use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::time::Duration;

use tokio::net::UnixStream;

use crate::common::paths;

pub mod platform {
    pub use interprocess::local_socket::tokio::{prelude::*, Listener, Stream};
    pub use interprocess::local_socket::{GenericFilePath, ListenerOptions};
}

use platform::*;

/// Socket-level settings for a connect attempt
#[derive(Debug, Clone)]
pub struct SocketOptions {
    pub connect_timeout: Duration,
    /// Requested SO_SNDBUF / SO_RCVBUF; zero leaves the kernel default
    pub buffer_size: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            buffer_size: 1024 * 1024,
        }
    }
}

/// Connect to the supervisor's control socket
pub async fn open_stream(path: &Path, options: &SocketOptions) -> io::Result<UnixStream> {
    let stream = tokio::time::timeout(options.connect_timeout, UnixStream::connect(path))
        .await
        .map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect timed out after {:?}", options.connect_timeout),
            )
        })??;

    if options.buffer_size > 0 {
        if let Err(e) = set_buffer_sizes(&stream, options.buffer_size) {
            tracing::warn!(error = %e, "Could not enlarge socket buffers");
        }
    }

    Ok(stream)
}

/// Request send and receive buffers of `size` bytes
pub fn set_buffer_sizes(stream: &UnixStream, size: usize) -> io::Result<()> {
    let fd = stream.as_raw_fd();
    let value = libc::c_int::try_from(size).unwrap_or(libc::c_int::MAX);

    for option in [libc::SO_SNDBUF, libc::SO_RCVBUF] {
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                option,
                &value as *const libc::c_int as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(())
}

/// Whether a write error means the link itself is gone
///
/// EAGAIN never reaches here: the runtime waits for writability instead.
pub fn is_link_fault(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero
    )
}

/// Create a listener on `path`, replacing any stale socket file
pub async fn create_listener(path: &Path) -> io::Result<Listener> {
    paths::ensure_socket_dir(path)?;
    paths::remove_socket(path)?;

    let name = path.to_string_lossy().into_owned();
    let name = name.to_fs_name::<GenericFilePath>()?;
    let listener = ListenerOptions::new().name(name).create_tokio()?;

    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;

    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_fault_classification() {
        for kind in [
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionRefused,
            io::ErrorKind::NotConnected,
        ] {
            assert!(is_link_fault(&io::Error::from(kind)), "{:?}", kind);
        }
        assert!(!is_link_fault(&io::Error::from(io::ErrorKind::InvalidInput)));
        assert!(!is_link_fault(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_open_stream_missing_socket() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_stream(&dir.path().join("absent.sock"), &SocketOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_open_stream_sets_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.sock");
        let _listener = tokio::net::UnixListener::bind(&path).unwrap();

        let stream = open_stream(&path, &SocketOptions::default()).await.unwrap();
        set_buffer_sizes(&stream, 256 * 1024).unwrap();
    }
}
