//! Call stubs.
//!
//! One stub per remote operation. Each stub marshals its arguments in
//! protocol order, waits for the result frame, and on a -1 result fetches
//! the errno frame, surfacing it as [`RemoteError`] so the caller sees the
//! same failure a local syscall would have produced.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::{ClientError, RemoteError};
use bytes::Bytes;
use remcall_protocol::call::{Call, OpenFlags, Whence};
use remcall_protocol::{ProtocolError, MAX_PAYLOAD_SIZE};
use std::sync::Arc;

/// High-level client for remcall.
pub struct Client {
    conn: Arc<Connection>,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
        }
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    /// A transport or framing fault leaves the stream desynchronized, so
    /// the connection is unusable afterwards; remote errors do not.
    fn seal<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(ClientError::Io(_) | ClientError::Protocol(_)) = result {
            self.conn.mark_disconnected();
        }
        result
    }

    fn check_len(len: usize) -> Result<u32, ClientError> {
        if len as u64 > MAX_PAYLOAD_SIZE {
            return Err(ClientError::Protocol(ProtocolError::FrameTooLarge {
                size: len as u64,
                max: MAX_PAYLOAD_SIZE,
            }));
        }
        Ok(len as u32)
    }

    // =========================================================================
    // Call stubs
    // =========================================================================

    /// Opens a remote file, returning its handle.
    ///
    /// `mode` is required exactly when `flags` has the create bit; it
    /// travels on the wire only in that case.
    pub async fn open(
        &self,
        path: &str,
        flags: OpenFlags,
        mode: Option<u32>,
    ) -> Result<u32, ClientError> {
        let mut guard = self.conn.io().await;
        let io = guard.as_mut().ok_or(ClientError::NotConnected)?;

        let result = async {
            let call = Call::Open {
                path: path.to_string(),
                flags,
                mode,
            };
            call.write_to(&mut io.writer).await?;

            let result = io.reader.read_i32().await?;
            if result == -1 {
                let errno = io.reader.read_i32().await?;
                return Err(ClientError::Remote(RemoteError::new(errno)));
            }
            Ok(result as u32)
        }
        .await;

        self.seal(result)
    }

    /// Closes a remote file handle.
    pub async fn close_file(&self, handle: u32) -> Result<(), ClientError> {
        let mut guard = self.conn.io().await;
        let io = guard.as_mut().ok_or(ClientError::NotConnected)?;

        let result = async {
            Call::Close { handle }.write_to(&mut io.writer).await?;

            let result = io.reader.read_i32().await?;
            if result == -1 {
                let errno = io.reader.read_i32().await?;
                return Err(ClientError::Remote(RemoteError::new(errno)));
            }
            Ok(())
        }
        .await;

        self.seal(result)
    }

    /// Reads up to `buf.len()` bytes from a remote file into `buf`,
    /// returning the number of bytes read (0 at EOF).
    pub async fn read(&self, handle: u32, buf: &mut [u8]) -> Result<usize, ClientError> {
        let count = Self::check_len(buf.len())?;
        let mut guard = self.conn.io().await;
        let io = guard.as_mut().ok_or(ClientError::NotConnected)?;

        let result = async {
            // Marshalling order sends the buffer's current contents ahead
            // of the count; the server consumes and discards that frame.
            let call = Call::Read {
                handle,
                buffer: Bytes::copy_from_slice(buf),
                count,
            };
            call.write_to(&mut io.writer).await?;

            let result = io.reader.read_i32().await?;
            if result == -1 {
                let errno = io.reader.read_i32().await?;
                return Err(ClientError::Remote(RemoteError::new(errno)));
            }

            let n = result as usize;
            if n > 0 {
                let data = io.reader.read_frame().await?;
                if data.len() != n || n > buf.len() {
                    return Err(ClientError::Protocol(ProtocolError::WrongPayloadLen {
                        expected: n.min(buf.len()),
                        actual: data.len(),
                    }));
                }
                buf[..n].copy_from_slice(data.payload());
            }
            Ok(n)
        }
        .await;

        self.seal(result)
    }

    /// Writes `buf` to a remote file, returning the number of bytes the
    /// server actually wrote.
    pub async fn write(&self, handle: u32, buf: &[u8]) -> Result<usize, ClientError> {
        let count = Self::check_len(buf.len())?;
        let mut guard = self.conn.io().await;
        let io = guard.as_mut().ok_or(ClientError::NotConnected)?;

        let result = async {
            let call = Call::Write {
                handle,
                buffer: Bytes::copy_from_slice(buf),
                count,
            };
            call.write_to(&mut io.writer).await?;

            let result = io.reader.read_i32().await?;
            if result == -1 {
                let errno = io.reader.read_i32().await?;
                return Err(ClientError::Remote(RemoteError::new(errno)));
            }

            let n = result as usize;
            if n > 0 {
                // The handler echoes the bytes it wrote; consume the frame
                // so the stream stays aligned for the next call.
                let echo = io.reader.read_frame().await?;
                if echo.len() != n {
                    return Err(ClientError::Protocol(ProtocolError::WrongPayloadLen {
                        expected: n,
                        actual: echo.len(),
                    }));
                }
            }
            Ok(n)
        }
        .await;

        self.seal(result)
    }

    /// Repositions a remote file, returning the new offset.
    pub async fn seek(
        &self,
        handle: u32,
        offset: i32,
        whence: Whence,
    ) -> Result<u64, ClientError> {
        let mut guard = self.conn.io().await;
        let io = guard.as_mut().ok_or(ClientError::NotConnected)?;

        let result = async {
            let call = Call::Seek {
                handle,
                offset,
                whence,
            };
            call.write_to(&mut io.writer).await?;

            let result = io.reader.read_i32().await?;
            if result == -1 {
                let errno = io.reader.read_i32().await?;
                return Err(ClientError::Remote(RemoteError::new(errno)));
            }
            Ok(result as u64)
        }
        .await;

        self.seal(result)
    }

    /// Asks the server for the XOR-fold checksum of a remote file.
    ///
    /// The file position is back at offset 0 when the call returns.
    pub async fn checksum(&self, handle: u32, block_size: u32) -> Result<i16, ClientError> {
        let mut guard = self.conn.io().await;
        let io = guard.as_mut().ok_or(ClientError::NotConnected)?;

        let result = async {
            let call = Call::Checksum { handle, block_size };
            call.write_to(&mut io.writer).await?;

            let sum = io.reader.read_i16().await?;
            if sum == -1 {
                // A genuine all-ones fold is indistinguishable from the
                // failure marker; the wire contract pays that cost.
                let errno = io.reader.read_i32().await?;
                return Err(ClientError::Remote(RemoteError::new(errno)));
            }
            Ok(sum)
        }
        .await;

        self.seal(result)
    }
}
