//! Client error types.

use thiserror::Error;

/// An error reported by the server's local operation.
///
/// Carries the server's errno so callers can inspect the failure the same
/// way they would a local syscall's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteError {
    errno: i32,
}

impl RemoteError {
    pub fn new(errno: i32) -> Self {
        Self { errno }
    }

    /// The server-side errno value.
    pub fn errno(&self) -> i32 {
        self.errno
    }

    /// The failure as a standard `io::Error`, for `ErrorKind` matching.
    pub fn io_error(&self) -> std::io::Error {
        std::io::Error::from_raw_os_error(self.errno)
    }

    pub fn kind(&self) -> std::io::ErrorKind {
        self.io_error().kind()
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "errno {}: {}", self.errno, self.io_error())
    }
}

impl std::error::Error for RemoteError {}

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] remcall_protocol::ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connect timeout")]
    ConnectTimeout,

    #[error("remote operation failed: {0}")]
    Remote(RemoteError),
}

impl ClientError {
    /// Returns whether the server ended the stream cleanly.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, ClientError::Protocol(p) if p.is_clean_close())
    }

    /// Returns the remote errno, if this is a remote operation failure.
    pub fn remote_errno(&self) -> Option<i32> {
        match self {
            ClientError::Remote(r) => Some(r.errno()),
            _ => None,
        }
    }
}
