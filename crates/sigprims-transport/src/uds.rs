use std::io::{self, Read, Write};
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{flush_fully, read_available, write_fully, ByteSink, ByteSource};

/// A connected Unix domain socket stream.
///
/// Implements both `Read`/`Write` and the non-blocking [`ByteSource`] /
/// [`ByteSink`] capabilities. Call [`SignalStream::set_nonblocking`] before
/// driving a frame reader from a poll loop so reads return 0 instead of
/// blocking.
#[derive(Debug)]
pub struct SignalStream {
    inner: UnixStream,
    eof: bool,
}

impl SignalStream {
    pub(crate) fn from_unix(inner: UnixStream) -> Self {
        Self { inner, eof: false }
    }

    /// Create a connected pair of streams.
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Switch the stream between blocking and non-blocking reads.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.inner.set_nonblocking(nonblocking).map_err(Into::into)
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self::from_unix(self.inner.try_clone()?))
    }

    /// True once the peer has closed its end.
    pub fn is_eof(&self) -> bool {
        self.eof
    }
}

impl Read for SignalStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for SignalStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl ByteSource for SignalStream {
    fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match read_available(&mut self.inner, buf)? {
            Some(n) => Ok(n),
            None => {
                self.eof = true;
                Ok(0)
            }
        }
    }
}

impl ByteSink for SignalStream {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        write_fully(&mut self.inner, buf)
    }

    fn flush_bytes(&mut self) -> io::Result<()> {
        flush_fully(&mut self.inner)
    }
}

/// Unix domain socket listener.
///
/// Binds a filesystem-path socket and removes it again on `Drop`, as long as
/// the path still refers to the socket this listener created.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    identity: (u64, u64),
}

impl UnixDomainSocket {
    /// Permission bits applied to the socket file.
    pub const SOCKET_MODE: u32 = 0o600;

    /// Bind `path`, replacing a stale socket left there by an earlier run.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bind_err = |source| TransportError::Bind {
            path: path.clone(),
            source,
        };

        clear_stale(&path)?;
        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(Self::SOCKET_MODE))
            .map_err(bind_err)?;
        let identity = file_identity(&path).map_err(bind_err)?;

        info!(?path, "listening for signal streams");
        Ok(Self {
            listener,
            path,
            identity,
        })
    }

    /// Block until a peer connects.
    pub fn accept(&self) -> Result<SignalStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted signal stream");
        Ok(SignalStream::from_unix(stream))
    }

    /// Connect to a listening socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<SignalStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, "connected signal stream");
        Ok(SignalStream::from_unix(stream))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        match file_identity(&self.path) {
            Ok(identity) if identity == self.identity => {
                debug!(path = ?self.path, "removing socket file");
                let _ = std::fs::remove_file(&self.path);
            }
            _ => debug!(path = ?self.path, "socket path no longer ours"),
        }
    }
}

/// Remove a leftover socket at `path`. Any other kind of file is an error.
fn clear_stale(path: &Path) -> Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(TransportError::Bind {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if !metadata.file_type().is_socket() {
        return Err(TransportError::NotASocket(path.to_path_buf()));
    }
    debug!(?path, "removing stale socket");
    std::fs::remove_file(path).map_err(|source| TransportError::Bind {
        path: path.to_path_buf(),
        source,
    })
}

/// Device and inode of the socket file at `path`.
fn file_identity(path: &Path) -> io::Result<(u64, u64)> {
    let metadata = std::fs::symlink_metadata(path)?;
    if !metadata.file_type().is_socket() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "not a socket"));
    }
    Ok((metadata.dev(), metadata.ino()))
}
