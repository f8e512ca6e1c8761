//! Call handlers.
//!
//! One handler per operation. Each performs the local filesystem
//! equivalent, then sends the numeric result frame, followed by the errno
//! frame only when the result is -1 (plus the data or echo frame for READ
//! and WRITE). A failed local operation is a normal response, not a
//! connection fault; only transport failures propagate as errors.

use crate::error::ServerError;
use crate::session::{Session, SessionState};
use bytes::Bytes;
use remcall_protocol::call::{Call, OpenFlags, Whence};
use remcall_protocol::checksum::xor_checksum;
use remcall_protocol::error::{errno, errno_of};
use remcall_protocol::wire::FrameWriter;
use remcall_protocol::MAX_PAYLOAD_SIZE;
use std::fs::OpenOptions;
use std::io::{Read, Seek, Write};
use tokio::io::AsyncWrite;

/// Dispatches decoded calls to their handlers.
pub struct SyscallHandler;

impl SyscallHandler {
    /// Routes one call to its handler and sends the response.
    pub async fn dispatch<W: AsyncWrite + Unpin>(
        call: Call,
        session: &mut Session,
        writer: &mut FrameWriter<W>,
    ) -> Result<(), ServerError> {
        match call {
            Call::Open { path, flags, mode } => {
                Self::handle_open(session, writer, path, flags, mode).await
            }
            Call::Close { handle } => Self::handle_close(session, writer, handle).await,
            Call::Read {
                handle,
                buffer,
                count,
            } => Self::handle_read(session, writer, handle, buffer, count).await,
            Call::Write {
                handle,
                buffer,
                count,
            } => Self::handle_write(session, writer, handle, buffer, count).await,
            Call::Seek {
                handle,
                offset,
                whence,
            } => Self::handle_seek(session, writer, handle, offset, whence).await,
            Call::Checksum { handle, block_size } => {
                Self::handle_checksum(session, writer, handle, block_size).await
            }
        }
    }

    /// Sends an i32 result, with the errno frame appended on failure.
    async fn send_result<W: AsyncWrite + Unpin>(
        writer: &mut FrameWriter<W>,
        outcome: Result<i32, i32>,
    ) -> Result<(), ServerError> {
        match outcome {
            Ok(value) => writer.write_i32(value).await?,
            Err(err) => {
                writer.write_i32(-1).await?;
                writer.write_i32(err).await?;
            }
        }
        Ok(())
    }

    async fn handle_open<W: AsyncWrite + Unpin>(
        session: &mut Session,
        writer: &mut FrameWriter<W>,
        path: String,
        flags: OpenFlags,
        mode: Option<u32>,
    ) -> Result<(), ServerError> {
        let mut opts = OpenOptions::new();
        opts.read(flags.has_read())
            .write(flags.has_write() || flags.has_append())
            .append(flags.has_append())
            .truncate(flags.has_truncate());
        if flags.has_create() && flags.has_excl() {
            opts.create_new(true);
        } else {
            opts.create(flags.has_create());
        }

        #[cfg(unix)]
        if let Some(mode) = mode {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;

        let outcome = match opts.open(&path) {
            Ok(file) => {
                let handle = session.files_mut().insert(file);
                tracing::debug!(session = %session.id, %path, handle, "opened");
                Ok(handle as i32)
            }
            Err(e) => Err(errno_of(&e)),
        };

        session.set_state(SessionState::Responding);
        Self::send_result(writer, outcome).await
    }

    async fn handle_close<W: AsyncWrite + Unpin>(
        session: &mut Session,
        writer: &mut FrameWriter<W>,
        handle: u32,
    ) -> Result<(), ServerError> {
        let outcome = match session.files_mut().remove(handle) {
            Some(file) => {
                drop(file);
                tracing::debug!(session = %session.id, handle, "closed");
                Ok(0)
            }
            None => Err(errno::EBADF),
        };

        session.set_state(SessionState::Responding);
        Self::send_result(writer, outcome).await
    }

    async fn handle_read<W: AsyncWrite + Unpin>(
        session: &mut Session,
        writer: &mut FrameWriter<W>,
        handle: u32,
        buffer: Bytes,
        count: u32,
    ) -> Result<(), ServerError> {
        // The buffer frame is consumed by the argument decode and carries
        // nothing the handler needs; only its arrival matters for keeping
        // the frame sequence aligned.
        drop(buffer);

        let outcome = if count as u64 > MAX_PAYLOAD_SIZE {
            // The data could never be framed back.
            Err(errno::EINVAL)
        } else {
            match session.files_mut().get_mut(handle) {
                None => Err(errno::EBADF),
                Some(file) => {
                    let mut data = vec![0u8; count as usize];
                    match file.read(&mut data) {
                        Ok(n) => {
                            data.truncate(n);
                            Ok(data)
                        }
                        Err(e) => Err(errno_of(&e)),
                    }
                }
            }
        };

        session.set_state(SessionState::Responding);
        match outcome {
            Ok(data) => {
                writer.write_i32(data.len() as i32).await?;
                if !data.is_empty() {
                    writer.write_frame(&data).await?;
                }
            }
            Err(err) => {
                writer.write_i32(-1).await?;
                writer.write_i32(err).await?;
            }
        }
        Ok(())
    }

    async fn handle_write<W: AsyncWrite + Unpin>(
        session: &mut Session,
        writer: &mut FrameWriter<W>,
        handle: u32,
        buffer: Bytes,
        count: u32,
    ) -> Result<(), ServerError> {
        let outcome = if count as usize > buffer.len() {
            Err(errno::EINVAL)
        } else {
            match session.files_mut().get_mut(handle) {
                None => Err(errno::EBADF),
                Some(file) => match file.write(&buffer[..count as usize]) {
                    Ok(n) => Ok(n),
                    Err(e) => Err(errno_of(&e)),
                },
            }
        };

        session.set_state(SessionState::Responding);
        match outcome {
            Ok(written) => {
                writer.write_i32(written as i32).await?;
                if written > 0 {
                    writer.write_frame(&buffer[..written]).await?;
                }
            }
            Err(err) => {
                writer.write_i32(-1).await?;
                writer.write_i32(err).await?;
            }
        }
        Ok(())
    }

    async fn handle_seek<W: AsyncWrite + Unpin>(
        session: &mut Session,
        writer: &mut FrameWriter<W>,
        handle: u32,
        offset: i32,
        whence: Whence,
    ) -> Result<(), ServerError> {
        let outcome = match whence.seek_from(offset) {
            None => Err(errno::EINVAL),
            Some(pos) => match session.files_mut().get_mut(handle) {
                None => Err(errno::EBADF),
                Some(file) => match file.seek(pos) {
                    // The wire result field is 32-bit; a position beyond
                    // it is an overflow, never a silent truncation.
                    Ok(new_pos) if new_pos > i32::MAX as u64 => Err(errno::EOVERFLOW),
                    Ok(new_pos) => Ok(new_pos as i32),
                    Err(e) => Err(errno_of(&e)),
                },
            },
        };

        session.set_state(SessionState::Responding);
        Self::send_result(writer, outcome).await
    }

    async fn handle_checksum<W: AsyncWrite + Unpin>(
        session: &mut Session,
        writer: &mut FrameWriter<W>,
        handle: u32,
        block_size: u32,
    ) -> Result<(), ServerError> {
        let outcome = if block_size == 0 {
            Err(errno::EINVAL)
        } else {
            match session.files_mut().get_mut(handle) {
                None => Err(errno::EBADF),
                Some(file) => match xor_checksum(file, block_size) {
                    Ok(sum) => Ok(sum),
                    Err(e) => Err(errno_of(&e)),
                },
            }
        };

        session.set_state(SessionState::Responding);
        match outcome {
            Ok(sum) => writer.write_i16(sum).await?,
            Err(err) => {
                writer.write_i16(-1).await?;
                writer.write_i32(err).await?;
            }
        }
        Ok(())
    }
}
