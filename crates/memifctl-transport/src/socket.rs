use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::ControlStream;

/// Where a stock dataplane exposes its binary API socket.
pub const DEFAULT_API_SOCKET: &str = "/run/vpp/api.sock";

/// The dataplane API socket.
///
/// Clients only ever call [`ControlSocket::connect`]. Binding is used by
/// simulated dataplanes in tests and demos; the socket file is removed on
/// drop if it is still the one this process created.
pub struct ControlSocket {
    listener: UnixListener,
    path: PathBuf,
    created_inode: (u64, u64),
}

impl ControlSocket {
    /// Permission mode applied to a bound socket path.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// `sockaddr_un.sun_path` capacity.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Connect to a listening API socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<ControlStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, "connected to dataplane api socket");
        Ok(ControlStream::from_unix(stream))
    }

    /// Bind and listen with [`Self::DEFAULT_SOCKET_MODE`], replacing a stale
    /// socket file at `path`.
    ///
    /// Any existing path that is not a socket is left alone and reported as
    /// a bind error.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = path.as_os_str().len();
        if len >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: Self::MAX_PATH_LEN,
            });
        }

        let bind_err = |source: std::io::Error| TransportError::Bind {
            path: path.clone(),
            source,
        };

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(Self::DEFAULT_SOCKET_MODE))
            .map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "listening for control clients");

        Ok(Self {
            listener,
            created_inode: (created.dev(), created.ino()),
            path,
        })
    }

    /// Accept one control client (blocking).
    pub fn accept(&self) -> Result<ControlStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted control client");
        Ok(ControlStream::from_unix(stream))
    }

    /// The bound socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        let (dev, ino) = self.created_inode;
        match std::fs::symlink_metadata(&self.path) {
            Ok(metadata)
                if metadata.file_type().is_socket()
                    && metadata.dev() == dev
                    && metadata.ino() == ino =>
            {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            }
            Ok(_) => debug!(path = ?self.path, "socket path replaced; skipping cleanup"),
            Err(_) => {}
        }
    }
}
