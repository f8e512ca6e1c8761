//! Protocol error types and errno constants.

use thiserror::Error;

/// Protocol-level errors that can occur during framing or call marshalling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer ended the stream at a frame boundary. This is the clean
    /// termination condition, not a fault.
    #[error("peer closed the connection")]
    ConnectionClosed,

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u64, max: u64 },

    #[error("expected a {expected}-byte integer payload, got {actual} bytes")]
    WrongPayloadLen { expected: usize, actual: usize },

    #[error("unknown call code: {0}")]
    UnknownCall(u32),

    #[error("invalid open flags: {0:#x}")]
    InvalidFlags(u32),

    #[error("invalid seek whence: {0}")]
    InvalidWhence(u32),

    #[error("open mode is required when the create flag is set")]
    MissingMode,

    #[error("path is not valid UTF-8")]
    InvalidPath,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns whether this error is the clean end-of-stream condition,
    /// as opposed to a transport or framing fault.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, ProtocolError::ConnectionClosed)
    }
}

/// POSIX errno values carried on the wire.
///
/// Only the values the handlers themselves raise are named here; everything
/// else passes through from the operating system verbatim.
pub mod errno {
    /// No such file or directory.
    pub const ENOENT: i32 = 2;
    /// I/O error; also the fallback when the OS gives no errno.
    pub const EIO: i32 = 5;
    /// Bad file handle.
    pub const EBADF: i32 = 9;
    /// Invalid argument.
    pub const EINVAL: i32 = 22;
    /// Value too large for the 32-bit wire field.
    pub const EOVERFLOW: i32 = 75;
}

/// Extracts the raw OS errno from an `io::Error`, falling back to EIO for
/// synthetic errors that carry none.
pub fn errno_of(err: &std::io::Error) -> i32 {
    err.raw_os_error().unwrap_or(errno::EIO)
}
