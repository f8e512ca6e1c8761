//! Binary frame format.
//!
//! Every unit on the wire is a length-prefixed frame:
//!
//! ```text
//! +----------------------+------------------------+
//! | length               | payload                |
//! | 8 bytes, big-endian  | length bytes           |
//! +----------------------+------------------------+
//! ```
//!
//! Multi-byte integers inside payloads are also big-endian. A zero-byte
//! read where a length prefix is expected means the peer closed the
//! connection; it is not an empty frame.

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 8;

/// A single frame: an owned, opaque payload.
///
/// Ownership of the payload transfers with the frame, so a consumed frame
/// cannot dangle across the marshal/unmarshal boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: Bytes,
}

impl Frame {
    /// Creates a frame with the given payload.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Creates a frame carrying a big-endian u32.
    pub fn from_u32(value: u32) -> Self {
        Self {
            payload: Bytes::copy_from_slice(&value.to_be_bytes()),
        }
    }

    /// Creates a frame carrying a big-endian i32.
    pub fn from_i32(value: i32) -> Self {
        Self {
            payload: Bytes::copy_from_slice(&value.to_be_bytes()),
        }
    }

    /// Creates a frame carrying a big-endian i16.
    pub fn from_i16(value: i16) -> Self {
        Self {
            payload: Bytes::copy_from_slice(&value.to_be_bytes()),
        }
    }

    /// Creates a frame carrying a big-endian u16.
    pub fn from_u16(value: u16) -> Self {
        Self {
            payload: Bytes::copy_from_slice(&value.to_be_bytes()),
        }
    }

    /// Returns the payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consumes the frame, returning the payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Returns the payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Decodes the payload as a big-endian u32, requiring an exact width.
    pub fn as_u32(&self) -> Result<u32, ProtocolError> {
        Ok(u32::from_be_bytes(self.exact_bytes::<4>()?))
    }

    /// Decodes the payload as a big-endian i32, requiring an exact width.
    pub fn as_i32(&self) -> Result<i32, ProtocolError> {
        Ok(i32::from_be_bytes(self.exact_bytes::<4>()?))
    }

    /// Decodes the payload as a big-endian i16, requiring an exact width.
    pub fn as_i16(&self) -> Result<i16, ProtocolError> {
        Ok(i16::from_be_bytes(self.exact_bytes::<2>()?))
    }

    /// Decodes the payload as a big-endian u16, requiring an exact width.
    pub fn as_u16(&self) -> Result<u16, ProtocolError> {
        Ok(u16::from_be_bytes(self.exact_bytes::<2>()?))
    }

    fn exact_bytes<const N: usize>(&self) -> Result<[u8; N], ProtocolError> {
        if self.payload.len() != N {
            return Err(ProtocolError::WrongPayloadLen {
                expected: N,
                actual: self.payload.len(),
            });
        }
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.payload);
        Ok(buf)
    }

    /// Encodes the frame into length-prefixed bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let len = self.payload.len() as u64;
        if len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + self.payload.len());
        buf.put_u64(len);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes a frame from a buffer.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let mut len_bytes = [0u8; LENGTH_PREFIX_SIZE];
        len_bytes.copy_from_slice(&buf[..LENGTH_PREFIX_SIZE]);
        let len = u64::from_be_bytes(len_bytes);

        if len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let total = LENGTH_PREFIX_SIZE + len as usize;
        if buf.len() < total {
            return Ok(None);
        }

        buf.advance(LENGTH_PREFIX_SIZE);
        let payload = buf.split_to(len as usize).freeze();
        Ok(Some(Self { payload }))
    }
}
