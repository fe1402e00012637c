//! LZ4 helpers for UnityFS blocks and LZ4-framed payloads

use std::io::{Cursor, Read, Write};

use lz4_flex::frame::{FrameDecoder, FrameEncoder};

use crate::error::{Error, Result};

/// LZ4 frame magic number (little-endian `04 22 4D 18`).
pub const FRAME_MAGIC: [u8; 4] = [0x04, 0x22, 0x4D, 0x18];

/// Compress data as a raw LZ4 block (UnityFS compression type 2/3)
#[must_use]
pub fn compress_block(data: &[u8]) -> Vec<u8> {
    lz4_flex::block::compress(data)
}

/// Decompress a raw LZ4 block with a known output size
///
/// # Errors
/// Returns an error if the block is malformed or does not produce
/// exactly `decompressed_size` bytes.
pub fn decompress_block(data: &[u8], decompressed_size: usize) -> Result<Vec<u8>> {
    let out = lz4_flex::block::decompress(data, decompressed_size)
        .map_err(|e| Error::DecompressionError(format!("LZ4: {e}")))?;
    if out.len() != decompressed_size {
        return Err(Error::DecompressionError(format!(
            "LZ4: expected {decompressed_size} bytes, got {}",
            out.len()
        )));
    }
    Ok(out)
}

/// Decompress an LZ4 block whose size is stored as a little-endian u32 prefix
///
/// The prefix is checked for plausibility before allocating, since this is
/// also used speculatively on arbitrary data.
///
/// # Errors
/// Returns an error if the prefix is implausible or the block is malformed.
pub fn decompress_size_prepended(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 5 {
        return Err(Error::DecompressionError("LZ4: input too short".to_string()));
    }
    let size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    // LZ4 cannot expand beyond ~255x
    let max_plausible = (data.len() - 4).saturating_mul(255);
    if size == 0 || size > max_plausible || size as u64 > super::MAX_DECOMPRESSED_SIZE {
        return Err(Error::DecompressionError(format!(
            "LZ4: implausible prepended size {size}"
        )));
    }
    decompress_block(&data[4..], size)
}

/// Compress data as an LZ4 block behind a little-endian u32 size prefix
#[must_use]
pub fn compress_size_prepended(data: &[u8]) -> Vec<u8> {
    lz4_flex::block::compress_prepend_size(data)
}

/// Compress data as an LZ4 frame
///
/// # Errors
/// Returns an error if the encoder fails.
pub fn compress_frame(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = FrameEncoder::new(Vec::new());
    encoder.write_all(data)?;
    encoder
        .finish()
        .map_err(|e| Error::CompressionError(format!("LZ4 frame: {e}")))
}

/// Decompress an LZ4 frame
///
/// # Errors
/// Returns an error if the data is not a valid LZ4 frame.
pub fn decompress_frame(data: &[u8]) -> Result<Vec<u8>> {
    if !data.starts_with(&FRAME_MAGIC) {
        return Err(Error::DecompressionError("LZ4 frame: bad magic".to_string()));
    }
    let mut decoder = FrameDecoder::new(Cursor::new(data));
    let mut out = Vec::new();
    decoder
        .by_ref()
        .take(super::MAX_DECOMPRESSED_SIZE)
        .read_to_end(&mut out)
        .map_err(|e| Error::DecompressionError(format!("LZ4 frame: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_roundtrip() {
        let data = b"Dialogue: Hello there, traveller. Dialogue: Hello again.".repeat(8);
        let packed = compress_block(&data);
        assert_eq!(decompress_block(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_block_wrong_size_is_error() {
        let data = b"abcdabcdabcdabcd".to_vec();
        let packed = compress_block(&data);
        assert!(decompress_block(&packed, data.len() + 10).is_err());
    }

    #[test]
    fn test_size_prepended_rejects_huge_prefix() {
        let mut data = vec![0xFF, 0xFF, 0xFF, 0x7F];
        data.extend_from_slice(&[0u8; 8]);
        assert!(decompress_size_prepended(&data).is_err());
    }

    #[test]
    fn test_frame_roundtrip() {
        let packed = compress_frame(b"caption text").unwrap();
        assert_eq!(decompress_frame(&packed).unwrap(), b"caption text");
    }
}
