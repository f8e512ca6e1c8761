//! # remcall-client
//!
//! Client library for remcall. Provides one call stub per remote
//! operation over a strictly sequential request/response connection.

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::{ClientError, RemoteError};
