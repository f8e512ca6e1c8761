//! Connection management.

use crate::error::ClientError;
use remcall_protocol::wire::{FrameReader, FrameWriter};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Disable Nagle's algorithm on the socket.
    pub nodelay: bool,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            nodelay: true,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

/// The framed halves of an established connection.
pub(crate) struct Io {
    pub(crate) reader: FrameReader<BufReader<OwnedReadHalf>>,
    pub(crate) writer: FrameWriter<BufWriter<OwnedWriteHalf>>,
}

/// A connection to a remcall server.
///
/// Calls on one connection are strictly sequential request/response
/// pairs; the whole I/O pair sits behind one lock, so a second caller
/// simply waits for the call in flight.
pub struct Connection {
    config: ConnectionConfig,
    io: Mutex<Option<Io>>,
    connected: AtomicBool,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            io: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.addr);

        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| ClientError::ConnectTimeout)?
        .map_err(ClientError::Io)?;

        if self.config.nodelay {
            stream.set_nodelay(true).ok();
        }

        let (read_half, write_half) = stream.into_split();
        *self.io.lock().await = Some(Io {
            reader: FrameReader::new(BufReader::new(read_half)),
            writer: FrameWriter::new(BufWriter::new(write_half)),
        });
        self.connected.store(true, Ordering::SeqCst);

        tracing::debug!("Connected to {}", self.config.addr);
        Ok(())
    }

    /// Locks the connection's I/O pair for one call.
    pub(crate) async fn io(&self) -> MutexGuard<'_, Option<Io>> {
        self.io.lock().await
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Marks the connection as dead after a transport fault.
    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);

        if let Some(io) = self.io.lock().await.take() {
            tracing::debug!("Closing connection to {}", self.config.addr);
            let mut write_half = io.writer.into_inner();
            let _ = write_half.shutdown().await;
        }

        Ok(())
    }
}
