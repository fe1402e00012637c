//! UnityFS bundle writer
//!
//! Re-packs entries in their given order and flags. Blocks are written
//! LZ4-compressed when the writer uses LZ4 and stored otherwise. The blocks
//! info follows the header unless it is placed at the end of the file, and
//! the block data can be padded to a 16-byte boundary.

use super::types::{Bundle, BundleEntry, CompressionMethod};
use super::{
    BLOCK_SIZE, FLAG_BLOCKS_AND_DIRECTORY_COMBINED, FLAG_BLOCKS_INFO_AT_END, FLAG_BLOCK_INFO_NEEDS_PADDING, SIGNATURE,
};

/// Header flags that only change where things sit in the file
const LAYOUT_FLAGS: u32 = FLAG_BLOCKS_INFO_AT_END | FLAG_BLOCK_INFO_NEEDS_PADDING;
use crate::compression::lz4;
use crate::error::Result;
use crate::formats::binary::EndianWriter;

/// UnityFS bundle writer
#[derive(Debug, Clone)]
pub struct BundleWriter {
    format_version: u32,
    unity_version: String,
    unity_revision: String,
    compression: CompressionMethod,
    layout_flags: u32,
}

impl BundleWriter {
    /// Writer for a format 6/7/8 bundle
    #[must_use]
    pub fn new(format_version: u32, unity_version: &str, unity_revision: &str) -> Self {
        Self {
            format_version,
            unity_version: unity_version.to_string(),
            unity_revision: unity_revision.to_string(),
            compression: CompressionMethod::Lz4,
            layout_flags: 0,
        }
    }

    /// Writer matching the header, layout and block compression of `bundle`
    ///
    /// LZ4HC sources are re-packed with plain LZ4, which decodes
    /// identically; LZMA sources never load, so they are not handled.
    #[must_use]
    pub fn for_bundle(bundle: &Bundle) -> Self {
        let compression = if bundle.block_compression.is_lz4() {
            CompressionMethod::Lz4
        } else {
            CompressionMethod::None
        };
        Self::new(
            bundle.header.format_version,
            &bundle.header.unity_version,
            &bundle.header.unity_revision,
        )
        .with_compression(compression)
        .with_layout_flags(bundle.header.flags)
    }

    /// Keep the blocks-info-at-end and padding bits of `flags`; others are ignored
    #[must_use]
    pub fn with_layout_flags(mut self, flags: u32) -> Self {
        self.layout_flags = flags & LAYOUT_FLAGS;
        self
    }

    /// Set the block compression (LZ4 or none)
    #[must_use]
    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = if compression.is_lz4() {
            CompressionMethod::Lz4
        } else {
            CompressionMethod::None
        };
        self
    }

    /// Compress `data` with the writer's method, storing it if that is smaller
    fn pack(&self, data: &[u8]) -> (Vec<u8>, CompressionMethod) {
        if self.compression.is_lz4() {
            let packed = lz4::compress_block(data);
            if packed.len() < data.len() {
                return (packed, CompressionMethod::Lz4);
            }
        }
        (data.to_vec(), CompressionMethod::None)
    }

    /// Produce the bundle bytes for `entries`
    ///
    /// # Errors
    /// Currently infallible; kept fallible for parity with the readers.
    pub fn write(&self, entries: &[BundleEntry]) -> Result<Vec<u8>> {
        let stream: Vec<u8> = entries.iter().flat_map(|e| e.data.iter().copied()).collect();

        let mut block_table = Vec::new();
        let mut block_data = Vec::new();
        for chunk in stream.chunks(BLOCK_SIZE) {
            let (packed, method) = self.pack(chunk);
            block_table.push((chunk.len() as u32, packed.len() as u32, method.to_flags() as u16));
            block_data.extend_from_slice(&packed);
        }

        let mut info = EndianWriter::new(true);
        info.write_bytes(&[0; 16]);
        info.write_i32(block_table.len() as i32);
        for (uncompressed, compressed, flags) in &block_table {
            info.write_u32(*uncompressed);
            info.write_u32(*compressed);
            info.write_u16(*flags);
        }
        info.write_i32(entries.len() as i32);
        let mut offset = 0i64;
        for entry in entries {
            info.write_i64(offset);
            info.write_i64(entry.data.len() as i64);
            info.write_u32(entry.flags);
            info.write_cstring(&entry.path);
            offset += entry.data.len() as i64;
        }
        let info = info.into_inner();
        let (packed_info, info_method) = self.pack(&info);

        let mut w = EndianWriter::new(true);
        w.write_cstring(SIGNATURE);
        w.write_u32(self.format_version);
        w.write_cstring(&self.unity_version);
        w.write_cstring(&self.unity_revision);
        let size_pos = w.len();
        w.write_i64(0);
        w.write_u32(packed_info.len() as u32);
        w.write_u32(info.len() as u32);
        w.write_u32(FLAG_BLOCKS_AND_DIRECTORY_COMBINED | self.layout_flags | info_method.to_flags());
        if self.format_version >= 7 {
            w.align(16);
        }
        let info_at_end = self.layout_flags & FLAG_BLOCKS_INFO_AT_END != 0;
        if !info_at_end {
            w.write_bytes(&packed_info);
        }
        if self.layout_flags & FLAG_BLOCK_INFO_NEEDS_PADDING != 0 {
            w.align(16);
        }
        w.write_bytes(&block_data);
        if info_at_end {
            w.write_bytes(&packed_info);
        }

        let mut out = w.into_inner();
        let total = out.len() as i64;
        out[size_pos..size_pos + 8].copy_from_slice(&total.to_be_bytes());
        Ok(out)
    }
}

/// Re-pack a parsed bundle with its current entries
///
/// # Errors
/// See [`BundleWriter::write`].
pub fn serialize_bundle(bundle: &Bundle) -> Result<Vec<u8>> {
    BundleWriter::for_bundle(bundle).write(&bundle.entries)
}
