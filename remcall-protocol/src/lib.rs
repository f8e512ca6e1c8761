//! # remcall-protocol
//!
//! Wire protocol implementation for remcall (RFC - Remote Filesystem Calls).
//!
//! This crate provides:
//! - Length-prefixed binary framing
//! - Typed integer encoding in network byte order
//! - Call argument marshalling, symmetric between client and server
//! - The XOR-fold file checksum primitive
//! - Protocol error types and POSIX errno constants

pub mod call;
pub mod checksum;
pub mod error;
pub mod frame;
pub mod wire;

pub use call::{Call, CallCode, OpenFlags, Whence};
pub use checksum::{xor_checksum, DEFAULT_BLOCK_SIZE};
pub use error::ProtocolError;
pub use frame::{Frame, LENGTH_PREFIX_SIZE};
pub use wire::{FrameReader, FrameWriter};

/// Default port for the remcall server.
pub const DEFAULT_PORT: u16 = 7411;

/// Maximum frame payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u64 = 16 * 1024 * 1024;
