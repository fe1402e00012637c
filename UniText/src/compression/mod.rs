//! Compression utilities
//!
//! UnityFS storage blocks use LZ4 (raw blocks), while opaque or repacked
//! containers found in the wild are often wrapped in gzip/zlib/LZ4 frames
//! behind a small vendor header. The [`ladder`] module tries those in order.

use std::io::{Read, Write};

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

use crate::error::{Error, Result};

pub mod ladder;
pub mod lz4;

pub use ladder::{decompress_ladder, LadderHit, LadderMethod, SKIP_OFFSETS};

/// Upper bound for any single decompressed payload (1 GiB).
pub const MAX_DECOMPRESSED_SIZE: u64 = 1 << 30;

/// Decompress a gzip stream
///
/// # Errors
/// Returns an error if the stream is not valid gzip.
pub fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    read_limited(GzDecoder::new(data), "gzip")
}

/// Decompress a zlib stream
///
/// # Errors
/// Returns an error if the stream is not valid zlib.
pub fn decompress_zlib(data: &[u8]) -> Result<Vec<u8>> {
    read_limited(ZlibDecoder::new(data), "zlib")
}

/// Decompress a raw DEFLATE stream
///
/// # Errors
/// Returns an error if the stream is not valid DEFLATE.
pub fn decompress_deflate(data: &[u8]) -> Result<Vec<u8>> {
    read_limited(DeflateDecoder::new(data), "deflate")
}

/// Compress data as a gzip stream
///
/// # Errors
/// Returns an error if the encoder fails.
pub fn compress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Compress data as a zlib stream
///
/// # Errors
/// Returns an error if the encoder fails.
pub fn compress_zlib(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn read_limited<R: Read>(reader: R, label: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    reader
        .take(MAX_DECOMPRESSED_SIZE)
        .read_to_end(&mut out)
        .map_err(|e| Error::DecompressionError(format!("{label}: {e}")))?;
    Ok(out)
}
