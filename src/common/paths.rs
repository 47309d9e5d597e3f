//! Socket and configuration paths
//!
//! The supervisor listens on `control.sock` inside the user's configuration
//! directory for this application:
//! - Linux: `~/.config/companion-link/control.sock`
//! - macOS: `~/Library/Application Support/companion-link/control.sock`

use std::io;
use std::path::{Path, PathBuf};

/// Application name used for directories
const APP_NAME: &str = "companion-link";

/// File name of the control socket
const SOCKET_FILE: &str = "control.sock";

/// Get the default control socket path
///
/// Falls back to `/tmp/companion-link-<uid>/control.sock` when no home
/// directory can be determined.
pub fn socket_path() -> PathBuf {
    if let Some(dir) = config_dir() {
        return dir.join(SOCKET_FILE);
    }

    // Fallback to /tmp with uid for isolation between users
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/{}-{}", APP_NAME, uid)).join(SOCKET_FILE)
}

/// Ensure the directory holding `socket` exists
///
/// Newly created directories get mode 0700 (owner only).
pub fn ensure_socket_dir(socket: &Path) -> io::Result<PathBuf> {
    let dir = socket
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Invalid socket path"))?;

    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }

    Ok(dir.to_path_buf())
}

/// Remove a stale socket file if it exists
pub fn remove_socket(socket: &Path) -> io::Result<()> {
    if socket.exists() {
        std::fs::remove_file(socket)?;
    }
    Ok(())
}

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.data_dir().join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_is_valid() {
        let path = socket_path();
        assert!(path.ends_with(SOCKET_FILE));
    }

    #[test]
    fn test_ensure_and_remove_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("nested").join(SOCKET_FILE);

        let created = ensure_socket_dir(&socket).unwrap();
        assert!(created.is_dir());

        std::fs::write(&socket, b"").unwrap();
        remove_socket(&socket).unwrap();
        assert!(!socket.exists());

        // Removing a missing socket is not an error
        remove_socket(&socket).unwrap();
    }
}
