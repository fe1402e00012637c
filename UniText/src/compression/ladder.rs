//! Ordered decompression strategies for opaque containers
//!
//! Repacked game data is frequently a standard stream (gzip, zlib, LZ4)
//! hidden behind a fixed-size vendor header. The ladder tries every method
//! at every skip offset, in order, and returns the first success.

use crate::error::{Error, Result};

use super::{compress_gzip, compress_zlib, decompress_gzip, decompress_zlib, lz4};

/// Header sizes skipped before retrying the methods.
pub const SKIP_OFFSETS: [usize; 6] = [0, 16, 32, 64, 128, 256];

/// Decompressed outputs shorter than this are treated as false positives.
const MIN_OUTPUT: usize = 16;

/// A decompression method tried by the ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderMethod {
    Gzip,
    Zlib,
    Lz4Frame,
    Lz4SizePrepended,
}

impl LadderMethod {
    /// Methods in the order the ladder tries them
    pub const ALL: [LadderMethod; 4] = [
        LadderMethod::Gzip,
        LadderMethod::Zlib,
        LadderMethod::Lz4Frame,
        LadderMethod::Lz4SizePrepended,
    ];

    /// Short label for logs and extraction metadata
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            LadderMethod::Gzip => "gzip",
            LadderMethod::Zlib => "zlib",
            LadderMethod::Lz4Frame => "lz4-frame",
            LadderMethod::Lz4SizePrepended => "lz4-block",
        }
    }

    /// Cheap signature test so garbage is not fed to every decoder
    fn plausible(self, data: &[u8]) -> bool {
        match self {
            LadderMethod::Gzip => data.starts_with(&[0x1F, 0x8B]),
            // CMF must be deflate with a window <= 32K and FCHECK must hold
            LadderMethod::Zlib => {
                data.len() >= 2
                    && data[0] & 0x0F == 8
                    && data[0] >> 4 <= 7
                    && (u16::from(data[0]) << 8 | u16::from(data[1])) % 31 == 0
            }
            LadderMethod::Lz4Frame => data.starts_with(&lz4::FRAME_MAGIC),
            LadderMethod::Lz4SizePrepended => data.len() > 4,
        }
    }

    /// Compress `data` so that this method decompresses it again
    ///
    /// # Errors
    /// Returns an error if the encoder fails.
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            LadderMethod::Gzip => compress_gzip(data),
            LadderMethod::Zlib => compress_zlib(data),
            LadderMethod::Lz4Frame => lz4::compress_frame(data),
            LadderMethod::Lz4SizePrepended => Ok(lz4::compress_size_prepended(data)),
        }
    }

    fn run(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            LadderMethod::Gzip => decompress_gzip(data),
            LadderMethod::Zlib => decompress_zlib(data),
            LadderMethod::Lz4Frame => lz4::decompress_frame(data),
            LadderMethod::Lz4SizePrepended => lz4::decompress_size_prepended(data),
        }
    }
}

/// Successful ladder step
#[derive(Debug, Clone)]
pub struct LadderHit {
    /// The method that succeeded
    pub method: LadderMethod,
    /// Bytes skipped before the compressed stream
    pub skip: usize,
    /// Decompressed payload
    pub data: Vec<u8>,
}

/// Try every decompression method at every skip offset
///
/// # Errors
/// Returns [`Error::DecompressionError`] when every strategy fails.
pub fn decompress_ladder(data: &[u8]) -> Result<LadderHit> {
    for &skip in &SKIP_OFFSETS {
        if skip >= data.len() {
            break;
        }
        let slice = &data[skip..];
        for method in LadderMethod::ALL {
            if !method.plausible(slice) {
                continue;
            }
            match method.run(slice) {
                Ok(out) if out.len() >= MIN_OUTPUT => {
                    tracing::debug!(
                        "Decompressed {} -> {} bytes via {} at skip {}",
                        slice.len(),
                        out.len(),
                        method.label(),
                        skip
                    );
                    return Ok(LadderHit { method, skip, data: out });
                }
                Ok(_) => {}
                Err(e) => tracing::trace!("{} at skip {skip} failed: {e}", method.label()),
            }
        }
    }
    Err(Error::DecompressionError(format!(
        "all {} strategies exhausted over {} bytes",
        LadderMethod::ALL.len() * SKIP_OFFSETS.len(),
        data.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zlib(data: &[u8]) -> Vec<u8> {
        LadderMethod::Zlib.compress(data).unwrap()
    }

    #[test]
    fn test_ladder_finds_zlib_behind_header() {
        let payload = b"The knight said: \"We ride at dawn.\"".to_vec();
        let mut data = vec![0xAB; 32];
        data.extend(zlib(&payload));

        let hit = decompress_ladder(&data).unwrap();
        assert_eq!(hit.method, LadderMethod::Zlib);
        assert_eq!(hit.skip, 32);
        assert_eq!(hit.data, payload);
    }

    #[test]
    fn test_ladder_lz4_frame_at_start() {
        let payload = b"caption caption caption caption".to_vec();
        let data = lz4::compress_frame(&payload).unwrap();
        let hit = decompress_ladder(&data).unwrap();
        assert_eq!(hit.method, LadderMethod::Lz4Frame);
        assert_eq!(hit.skip, 0);
    }

    #[test]
    fn test_ladder_exhausted() {
        let data: Vec<u8> = (0..400u32).map(|i| (i * 7 % 251) as u8).collect();
        assert!(matches!(decompress_ladder(&data), Err(Error::DecompressionError(_))));
    }

    #[test]
    fn test_compressed_output_is_found_by_its_method() {
        let payload = b"Quest log: find the lighthouse keeper.".to_vec();
        for method in [LadderMethod::Gzip, LadderMethod::Zlib, LadderMethod::Lz4Frame] {
            let hit = decompress_ladder(&method.compress(&payload).unwrap()).unwrap();
            assert_eq!(hit.method, method);
            assert_eq!(hit.data, payload);
        }
        let packed = LadderMethod::Lz4SizePrepended.compress(&payload).unwrap();
        assert_eq!(lz4::decompress_size_prepended(&packed).unwrap(), payload);
    }
}
