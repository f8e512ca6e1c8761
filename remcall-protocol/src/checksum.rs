//! XOR-fold file checksum.
//!
//! A coarse integrity primitive, not a cryptographic one. Both ends of a
//! transfer run the same fold — the server over the source file, the
//! client over its local copy — and compare the two accumulators.

use std::io::{Read, Seek, SeekFrom};

/// Default block size for checksum reads.
pub const DEFAULT_BLOCK_SIZE: u32 = 2;

/// Computes the XOR-fold checksum of a file.
///
/// Seeks to offset 0, reads blocks of `block_size` bytes until EOF,
/// folding every byte into a 16-bit accumulator, then seeks back to
/// offset 0 so the file position is unchanged by the scan.
pub fn xor_checksum<F: Read + Seek>(file: &mut F, block_size: u32) -> std::io::Result<i16> {
    if block_size == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "checksum block size must be nonzero",
        ));
    }

    file.seek(SeekFrom::Start(0))?;

    let mut acc: i16 = 0;
    let mut buf = vec![0u8; block_size as usize];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for &byte in &buf[..n] {
            acc ^= byte as i16;
        }
    }

    file.seek(SeekFrom::Start(0))?;
    Ok(acc)
}
