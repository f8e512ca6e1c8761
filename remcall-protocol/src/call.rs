//! Call codes and argument marshalling.
//!
//! The argument order of every call is part of the protocol contract. Both
//! directions live here — [`Call::write_to`] and [`Call::read_from`] are
//! the single encode/decode pair — so client and server cannot drift apart
//! on ordering or on the conditional open-mode field.

use crate::error::ProtocolError;
use crate::wire::{FrameReader, FrameWriter};
use bytes::Bytes;
use std::fmt;
use std::io::SeekFrom;
use tokio::io::{AsyncRead, AsyncWrite};

/// Operation codes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CallCode {
    Open = 1,
    Close = 2,
    Read = 3,
    Write = 4,
    Seek = 5,
    Checksum = 6,
}

impl CallCode {
    /// Parses a wire call code.
    pub fn from_u32(raw: u32) -> Result<Self, ProtocolError> {
        match raw {
            1 => Ok(CallCode::Open),
            2 => Ok(CallCode::Close),
            3 => Ok(CallCode::Read),
            4 => Ok(CallCode::Write),
            5 => Ok(CallCode::Seek),
            6 => Ok(CallCode::Checksum),
            other => Err(ProtocolError::UnknownCall(other)),
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for CallCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallCode::Open => write!(f, "OPEN"),
            CallCode::Close => write!(f, "CLOSE"),
            CallCode::Read => write!(f, "READ"),
            CallCode::Write => write!(f, "WRITE"),
            CallCode::Seek => write!(f, "SEEK"),
            CallCode::Checksum => write!(f, "CHECKSUM"),
        }
    }
}

/// Open flags bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags(u32);

impl OpenFlags {
    /// Open for reading.
    pub const READ: u32 = 1 << 0;
    /// Open for writing.
    pub const WRITE: u32 = 1 << 1;
    /// Create the file if it does not exist; a mode argument follows on
    /// the wire when this bit is set.
    pub const CREATE: u32 = 1 << 2;
    /// Truncate to zero length on open.
    pub const TRUNCATE: u32 = 1 << 3;
    /// Every write appends.
    pub const APPEND: u32 = 1 << 4;
    /// With CREATE, fail if the file already exists.
    pub const EXCL: u32 = 1 << 5;

    const VALID_MASK: u32 = 0x003F;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn read_only() -> Self {
        Self(Self::READ)
    }

    pub fn with_read(mut self) -> Self {
        self.0 |= Self::READ;
        self
    }

    pub fn with_write(mut self) -> Self {
        self.0 |= Self::WRITE;
        self
    }

    pub fn with_create(mut self) -> Self {
        self.0 |= Self::CREATE;
        self
    }

    pub fn with_truncate(mut self) -> Self {
        self.0 |= Self::TRUNCATE;
        self
    }

    pub fn with_append(mut self) -> Self {
        self.0 |= Self::APPEND;
        self
    }

    pub fn with_excl(mut self) -> Self {
        self.0 |= Self::EXCL;
        self
    }

    pub fn has_read(&self) -> bool {
        self.0 & Self::READ != 0
    }

    pub fn has_write(&self) -> bool {
        self.0 & Self::WRITE != 0
    }

    pub fn has_create(&self) -> bool {
        self.0 & Self::CREATE != 0
    }

    pub fn has_truncate(&self) -> bool {
        self.0 & Self::TRUNCATE != 0
    }

    pub fn has_append(&self) -> bool {
        self.0 & Self::APPEND != 0
    }

    pub fn has_excl(&self) -> bool {
        self.0 & Self::EXCL != 0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Result<Self, ProtocolError> {
        if bits & !Self::VALID_MASK != 0 {
            return Err(ProtocolError::InvalidFlags(bits));
        }
        Ok(Self(bits))
    }
}

/// Seek origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Whence {
    Start = 0,
    Current = 1,
    End = 2,
}

impl Whence {
    pub fn from_u32(raw: u32) -> Result<Self, ProtocolError> {
        match raw {
            0 => Ok(Whence::Start),
            1 => Ok(Whence::Current),
            2 => Ok(Whence::End),
            other => Err(ProtocolError::InvalidWhence(other)),
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Combines the whence with a 32-bit offset into a [`SeekFrom`].
    ///
    /// Returns `None` for a negative absolute offset, which has no
    /// representation and must be rejected as invalid.
    pub fn seek_from(self, offset: i32) -> Option<SeekFrom> {
        match self {
            Whence::Start => {
                if offset < 0 {
                    None
                } else {
                    Some(SeekFrom::Start(offset as u64))
                }
            }
            Whence::Current => Some(SeekFrom::Current(offset as i64)),
            Whence::End => Some(SeekFrom::End(offset as i64)),
        }
    }
}

/// A decoded call: the operation plus its arguments.
///
/// The open mode is an explicit optional field; it travels on the wire
/// exactly when the CREATE flag is set, on encode and decode alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open {
        path: String,
        flags: OpenFlags,
        mode: Option<u32>,
    },
    Close {
        handle: u32,
    },
    Read {
        handle: u32,
        buffer: Bytes,
        count: u32,
    },
    Write {
        handle: u32,
        buffer: Bytes,
        count: u32,
    },
    Seek {
        handle: u32,
        offset: i32,
        whence: Whence,
    },
    Checksum {
        handle: u32,
        block_size: u32,
    },
}

impl Call {
    /// Returns the operation code for this call.
    pub fn code(&self) -> CallCode {
        match self {
            Call::Open { .. } => CallCode::Open,
            Call::Close { .. } => CallCode::Close,
            Call::Read { .. } => CallCode::Read,
            Call::Write { .. } => CallCode::Write,
            Call::Seek { .. } => CallCode::Seek,
            Call::Checksum { .. } => CallCode::Checksum,
        }
    }

    /// Writes the call-code frame followed by the argument frames in
    /// protocol order.
    pub async fn write_to<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut FrameWriter<W>,
    ) -> Result<(), ProtocolError> {
        writer.write_u32(self.code().as_u32()).await?;

        match self {
            Call::Open { path, flags, mode } => {
                writer.write_frame(path.as_bytes()).await?;
                writer.write_u32(flags.bits()).await?;
                if flags.has_create() {
                    let mode = mode.ok_or(ProtocolError::MissingMode)?;
                    writer.write_u32(mode).await?;
                }
            }
            Call::Close { handle } => {
                writer.write_u32(*handle).await?;
            }
            Call::Read {
                handle,
                buffer,
                count,
            }
            | Call::Write {
                handle,
                buffer,
                count,
            } => {
                writer.write_u32(*handle).await?;
                writer.write_frame(buffer).await?;
                writer.write_u32(*count).await?;
            }
            Call::Seek {
                handle,
                offset,
                whence,
            } => {
                writer.write_u32(*handle).await?;
                writer.write_i32(*offset).await?;
                writer.write_u32(whence.as_u32()).await?;
            }
            Call::Checksum { handle, block_size } => {
                writer.write_u32(*handle).await?;
                writer.write_u32(*block_size).await?;
            }
        }

        Ok(())
    }

    /// Reads one call from the stream.
    ///
    /// Returns `Ok(None)` when the peer closed cleanly at the call-code
    /// boundary. A close anywhere inside the argument sequence, an
    /// unknown code, or malformed arguments are all errors.
    pub async fn read_from<R: AsyncRead + Unpin>(
        reader: &mut FrameReader<R>,
    ) -> Result<Option<Self>, ProtocolError> {
        let raw = match reader.read_u32().await {
            Ok(raw) => raw,
            Err(e) if e.is_clean_close() => return Ok(None),
            Err(e) => return Err(e),
        };
        let code = CallCode::from_u32(raw)?;

        let call = match code {
            CallCode::Open => {
                let path_frame = reader.read_frame().await?;
                let path = String::from_utf8(path_frame.into_payload().to_vec())
                    .map_err(|_| ProtocolError::InvalidPath)?;
                let flags = OpenFlags::from_bits(reader.read_u32().await?)?;
                let mode = if flags.has_create() {
                    Some(reader.read_u32().await?)
                } else {
                    None
                };
                Call::Open { path, flags, mode }
            }
            CallCode::Close => Call::Close {
                handle: reader.read_u32().await?,
            },
            CallCode::Read => {
                let handle = reader.read_u32().await?;
                let buffer = reader.read_frame().await?.into_payload();
                let count = reader.read_u32().await?;
                Call::Read {
                    handle,
                    buffer,
                    count,
                }
            }
            CallCode::Write => {
                let handle = reader.read_u32().await?;
                let buffer = reader.read_frame().await?.into_payload();
                let count = reader.read_u32().await?;
                Call::Write {
                    handle,
                    buffer,
                    count,
                }
            }
            CallCode::Seek => {
                let handle = reader.read_u32().await?;
                let offset = reader.read_i32().await?;
                let whence = Whence::from_u32(reader.read_u32().await?)?;
                Call::Seek {
                    handle,
                    offset,
                    whence,
                }
            }
            CallCode::Checksum => {
                let handle = reader.read_u32().await?;
                let block_size = reader.read_u32().await?;
                Call::Checksum { handle, block_size }
            }
        };

        Ok(Some(call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn roundtrip(call: Call) -> Call {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        call.write_to(&mut writer).await.unwrap();
        Call::read_from(&mut reader).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_open_roundtrip_with_mode() {
        let call = Call::Open {
            path: "/tmp/data.bin".to_string(),
            flags: OpenFlags::new().with_write().with_create(),
            mode: Some(0o644),
        };
        assert_eq!(roundtrip(call.clone()).await, call);
    }

    #[tokio::test]
    async fn test_open_roundtrip_without_mode() {
        let call = Call::Open {
            path: "/etc/hosts".to_string(),
            flags: OpenFlags::read_only(),
            mode: None,
        };
        assert_eq!(roundtrip(call.clone()).await, call);
    }

    #[tokio::test]
    async fn test_open_mode_sent_iff_create() {
        // Without CREATE, any stale mode value must not reach the wire:
        // the decoded call has no mode and the stream holds nothing more.
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        let call = Call::Open {
            path: "/a".to_string(),
            flags: OpenFlags::read_only(),
            mode: Some(0o777),
        };
        call.write_to(&mut writer).await.unwrap();
        drop(writer);

        let decoded = Call::read_from(&mut reader).await.unwrap().unwrap();
        assert_eq!(
            decoded,
            Call::Open {
                path: "/a".to_string(),
                flags: OpenFlags::read_only(),
                mode: None,
            }
        );
        assert!(Call::read_from(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_create_without_mode_is_rejected() {
        let (client, _server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);

        let call = Call::Open {
            path: "/a".to_string(),
            flags: OpenFlags::new().with_write().with_create(),
            mode: None,
        };
        let result = call.write_to(&mut writer).await;
        assert!(matches!(result, Err(ProtocolError::MissingMode)));
    }

    #[tokio::test]
    async fn test_close_roundtrip() {
        let call = Call::Close { handle: 7 };
        assert_eq!(roundtrip(call.clone()).await, call);
    }

    #[tokio::test]
    async fn test_read_roundtrip_carries_buffer_contents() {
        let call = Call::Read {
            handle: 3,
            buffer: Bytes::from_static(b"stale contents"),
            count: 14,
        };
        assert_eq!(roundtrip(call.clone()).await, call);
    }

    #[tokio::test]
    async fn test_write_roundtrip() {
        let call = Call::Write {
            handle: 3,
            buffer: Bytes::from_static(b"0123456789"),
            count: 10,
        };
        assert_eq!(roundtrip(call.clone()).await, call);
    }

    #[tokio::test]
    async fn test_seek_roundtrip_negative_offset() {
        let call = Call::Seek {
            handle: 4,
            offset: -128,
            whence: Whence::End,
        };
        assert_eq!(roundtrip(call.clone()).await, call);
    }

    #[tokio::test]
    async fn test_checksum_roundtrip() {
        let call = Call::Checksum {
            handle: 5,
            block_size: 2,
        };
        assert_eq!(roundtrip(call.clone()).await, call);
    }

    #[tokio::test]
    async fn test_unknown_call_code() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        writer.write_u32(99).await.unwrap();
        let result = Call::read_from(&mut reader).await;
        assert!(matches!(result, Err(ProtocolError::UnknownCall(99))));
    }

    #[tokio::test]
    async fn test_clean_close_yields_none() {
        let (client, server) = tokio::io::duplex(1024);
        let mut reader = FrameReader::new(server);
        drop(client);

        assert!(Call::read_from(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_mid_arguments_is_a_fault() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        // Code and handle arrive, then the stream ends before the offset.
        writer.write_u32(CallCode::Seek.as_u32()).await.unwrap();
        writer.write_u32(3).await.unwrap();
        drop(writer);

        let result = Call::read_from(&mut reader).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_call_code_names() {
        assert_eq!(CallCode::Open.to_string(), "OPEN");
        assert_eq!(CallCode::Close.to_string(), "CLOSE");
        assert_eq!(CallCode::Read.to_string(), "READ");
        assert_eq!(CallCode::Write.to_string(), "WRITE");
        assert_eq!(CallCode::Seek.to_string(), "SEEK");
        assert_eq!(CallCode::Checksum.to_string(), "CHECKSUM");
    }

    #[test]
    fn test_call_codes_are_stable() {
        assert_eq!(CallCode::Open.as_u32(), 1);
        assert_eq!(CallCode::Close.as_u32(), 2);
        assert_eq!(CallCode::Read.as_u32(), 3);
        assert_eq!(CallCode::Write.as_u32(), 4);
        assert_eq!(CallCode::Seek.as_u32(), 5);
        assert_eq!(CallCode::Checksum.as_u32(), 6);
    }

    #[test]
    fn test_open_flags() {
        let flags = OpenFlags::new().with_write().with_create().with_excl();
        assert!(flags.has_write());
        assert!(flags.has_create());
        assert!(flags.has_excl());
        assert!(!flags.has_read());
        assert!(!flags.has_truncate());
        assert!(!flags.has_append());
    }

    #[test]
    fn test_invalid_flag_bits() {
        let result = OpenFlags::from_bits(0x0100);
        assert!(matches!(result, Err(ProtocolError::InvalidFlags(0x0100))));
    }

    #[test]
    fn test_whence_mapping() {
        assert_eq!(Whence::from_u32(0).unwrap(), Whence::Start);
        assert_eq!(Whence::from_u32(1).unwrap(), Whence::Current);
        assert_eq!(Whence::from_u32(2).unwrap(), Whence::End);
        assert!(matches!(
            Whence::from_u32(3),
            Err(ProtocolError::InvalidWhence(3))
        ));
    }

    #[test]
    fn test_seek_from_rejects_negative_absolute() {
        assert_eq!(Whence::Start.seek_from(-1), None);
        assert_eq!(Whence::Start.seek_from(10), Some(SeekFrom::Start(10)));
        assert_eq!(Whence::Current.seek_from(-10), Some(SeekFrom::Current(-10)));
        assert_eq!(Whence::End.seek_from(-10), Some(SeekFrom::End(-10)));
    }
}
