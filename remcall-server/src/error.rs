//! Server error types.

use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] remcall_protocol::ProtocolError),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Returns whether this error is the peer's clean close rather than a
    /// fault. Connections ending this way exit with success status.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, ServerError::Protocol(p) if p.is_clean_close())
    }
}
