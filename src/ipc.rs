//! Control socket: a scoped, filesystem-path Unix stream socket
//! (`spec.md` §4.3).
use std::{
    fs,
    os::unix::net::UnixListener,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

/// Owns the listening [`UnixListener`] bound at a filesystem path, and
/// guarantees the path is removed when dropped (normal or abnormal
/// exit), matching `spec.md` §4.3/§5.
pub struct ControlSocket {
    path: PathBuf,
    listener: UnixListener,
}

impl ControlSocket {
    /// Best-effort removes any stale file at `path`, then binds and
    /// listens with an unspecified backlog.
    pub fn bind(path: &Path) -> std::io::Result<Self> {
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed stale control socket"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }

        let listener = UnixListener::bind(path)?;
        listener.set_nonblocking(true)?;

        Ok(ControlSocket {
            path: path.to_path_buf(),
            listener,
        })
    }

    /// The bound path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Borrows the underlying listener.
    pub fn listener(&self) -> &UnixListener {
        &self.listener
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path)
            && err.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), %err, "failed to remove control socket");
        }
    }
}
