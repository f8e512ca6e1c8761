//! # remcall-server
//!
//! TCP server for remcall. Accepts connections, runs one dispatch task per
//! connection, and executes filesystem calls against a connection-local
//! file table.

pub mod config;
pub mod error;
pub mod files;
pub mod handler;
pub mod server;
pub mod session;

pub use config::{Config, ConfigError};
pub use error::ServerError;
pub use files::FileTable;
pub use handler::SyscallHandler;
pub use server::{Server, ServerConfig, ServerStats};
pub use session::{Session, SessionState};
