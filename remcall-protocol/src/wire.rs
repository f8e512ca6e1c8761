//! Async frame transport over any byte stream.
//!
//! Reads are exact: a frame is returned only once its length prefix and
//! full payload have arrived, and a zero-byte first read of the prefix is
//! reported as [`ProtocolError::ConnectionClosed`] rather than as an I/O
//! failure. An end-of-stream anywhere else (mid-prefix or mid-payload) is a
//! transport fault.

use crate::error::ProtocolError;
use crate::frame::{Frame, LENGTH_PREFIX_SIZE};
use crate::MAX_PAYLOAD_SIZE;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Writes length-prefixed frames to an underlying stream.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Consumes the writer, returning the underlying stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Writes one frame: the length prefix, then the payload.
    ///
    /// A failure partway through leaves the stream desynchronized; callers
    /// must treat it as fatal to the connection.
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        let len = payload.len() as u64;
        if len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        self.inner.write_all(&len.to_be_bytes()).await?;
        self.inner.write_all(payload).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Writes a u32 frame in network byte order.
    pub async fn write_u32(&mut self, value: u32) -> Result<(), ProtocolError> {
        self.write_frame(&value.to_be_bytes()).await
    }

    /// Writes an i32 frame in network byte order.
    pub async fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError> {
        self.write_frame(&value.to_be_bytes()).await
    }

    /// Writes an i16 frame in network byte order.
    pub async fn write_i16(&mut self, value: i16) -> Result<(), ProtocolError> {
        self.write_frame(&value.to_be_bytes()).await
    }

    /// Writes a u16 frame in network byte order.
    pub async fn write_u16(&mut self, value: u16) -> Result<(), ProtocolError> {
        self.write_frame(&value.to_be_bytes()).await
    }
}

/// Reads length-prefixed frames from an underlying stream.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Consumes the reader, returning the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads one complete frame, blocking until every byte has arrived.
    ///
    /// Returns [`ProtocolError::ConnectionClosed`] only when the stream
    /// ends exactly at a frame boundary.
    pub async fn read_frame(&mut self) -> Result<Frame, ProtocolError> {
        let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];

        // The first read distinguishes a clean close from a truncated
        // prefix; read_exact alone cannot tell the two apart.
        let n = self.inner.read(&mut len_buf).await?;
        if n == 0 {
            return Err(ProtocolError::ConnectionClosed);
        }
        if n < LENGTH_PREFIX_SIZE {
            self.inner.read_exact(&mut len_buf[n..]).await?;
        }

        let len = u64::from_be_bytes(len_buf);
        if len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut payload = vec![0u8; len as usize];
        self.inner.read_exact(&mut payload).await?;
        Ok(Frame::new(Bytes::from(payload)))
    }

    /// Reads a u32 frame.
    pub async fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        self.read_frame().await?.as_u32()
    }

    /// Reads an i32 frame.
    pub async fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.read_frame().await?.as_i32()
    }

    /// Reads an i16 frame.
    pub async fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        self.read_frame().await?.as_i16()
    }

    /// Reads a u16 frame.
    pub async fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        self.read_frame().await?.as_u16()
    }
}
