//! UnityFS bundle reading

use std::fs;
use std::path::Path;

use super::types::{Bundle, BundleEntry, BundleHeader, CompressionMethod, StorageBlock};
use super::{
    is_bundle, FLAG_BLOCKS_INFO_AT_END, FLAG_BLOCK_INFO_NEEDS_PADDING, MAX_VERSION, MIN_VERSION, SIGNATURE,
};
use crate::compression::MAX_DECOMPRESSED_SIZE;
use crate::error::{Error, Result};
use crate::formats::binary::EndianReader;

/// Read a bundle from disk
///
/// # Errors
/// Returns an error if the file cannot be read or is not a valid bundle.
pub fn read_bundle<P: AsRef<Path>>(path: P) -> Result<Bundle> {
    let data = fs::read(path)?;
    parse_bundle_bytes(&data)
}

/// Parse a bundle, decompressing every storage block
///
/// # Errors
/// Returns [`Error::InvalidBundleSignature`],
/// [`Error::UnsupportedBundleVersion`],
/// [`Error::UnsupportedCompressionMethod`] (LZMA) or a decompression or
/// truncation error.
pub fn parse_bundle_bytes(data: &[u8]) -> Result<Bundle> {
    if !is_bundle(data) {
        let shown: String = data.iter().take(8).map(|&b| if b.is_ascii_graphic() { b as char } else { '.' }).collect();
        return Err(Error::InvalidBundleSignature(shown));
    }
    let mut r = EndianReader::new(data, true);
    r.skip(SIGNATURE.len() as u64 + 1)?;

    let format_version = r.read_u32()?;
    if !(MIN_VERSION..=MAX_VERSION).contains(&format_version) {
        return Err(Error::UnsupportedBundleVersion(format_version));
    }
    let header = BundleHeader {
        format_version,
        unity_version: r.read_cstring()?,
        unity_revision: r.read_cstring()?,
        size: r.read_i64()?,
        compressed_blocks_info_size: r.read_u32()?,
        uncompressed_blocks_info_size: r.read_u32()?,
        flags: r.read_u32()?,
    };
    if format_version >= 7 {
        r.align(16)?;
    }

    let compressed_size = header.compressed_blocks_info_size as usize;
    let blocks_info_raw = if header.flags & FLAG_BLOCKS_INFO_AT_END != 0 {
        let start = data.len().checked_sub(compressed_size).ok_or(Error::UnexpectedEof {
            offset: data.len() as u64,
        })?;
        data[start..].to_vec()
    } else {
        r.read_bytes(compressed_size)?
    };
    let blocks_info = header
        .blocks_info_compression()?
        .decompress(&blocks_info_raw, header.uncompressed_blocks_info_size as usize)?;
    if header.flags & FLAG_BLOCK_INFO_NEEDS_PADDING != 0 {
        r.align(16)?;
    }

    let (blocks, nodes) = parse_blocks_info(&blocks_info)?;

    let total: u64 = blocks.iter().map(|b| u64::from(b.uncompressed_size)).sum();
    if total > MAX_DECOMPRESSED_SIZE {
        return Err(Error::DecompressionError(format!("bundle expands to {total} bytes")));
    }
    let mut stream = Vec::with_capacity(total as usize);
    let mut block_compression = None;
    for block in &blocks {
        let method = CompressionMethod::from_flags(u32::from(block.flags))?;
        block_compression.get_or_insert(method);
        let raw = r.read_bytes(block.compressed_size as usize)?;
        stream.extend(method.decompress(&raw, block.uncompressed_size as usize)?);
    }

    let mut entries = Vec::with_capacity(nodes.len());
    for (offset, size, flags, path) in nodes {
        let start = usize::try_from(offset).ok();
        let end = start.and_then(|s| usize::try_from(size).ok().and_then(|n| s.checked_add(n)));
        let (Some(start), Some(end)) = (start, end) else {
            return Err(Error::UnexpectedEof { offset: offset as u64 });
        };
        let bytes = stream.get(start..end).ok_or(Error::UnexpectedEof { offset: end as u64 })?;
        entries.push(BundleEntry {
            path,
            flags,
            data: bytes.to_vec(),
        });
    }

    tracing::debug!(
        "UnityFS v{} ({}): {} blocks, {} entries",
        header.format_version,
        header.unity_version,
        blocks.len(),
        entries.len()
    );

    Ok(Bundle {
        header,
        block_compression: block_compression.unwrap_or(CompressionMethod::None),
        entries,
    })
}

type RawNode = (i64, i64, u32, String);

fn parse_blocks_info(data: &[u8]) -> Result<(Vec<StorageBlock>, Vec<RawNode>)> {
    let mut r = EndianReader::new(data, true);
    r.skip(16)?; // uncompressed data hash

    let block_count = r.read_i32()?;
    if block_count < 0 || block_count as usize * 10 > r.remaining() {
        return Err(Error::DecompressionError(format!("implausible block count {block_count}")));
    }
    let mut blocks = Vec::with_capacity(block_count as usize);
    for _ in 0..block_count {
        blocks.push(StorageBlock {
            uncompressed_size: r.read_u32()?,
            compressed_size: r.read_u32()?,
            flags: r.read_u16()?,
        });
    }

    let node_count = r.read_i32()?;
    if node_count < 0 || node_count as usize * 21 > r.remaining() {
        return Err(Error::DecompressionError(format!("implausible node count {node_count}")));
    }
    let mut nodes = Vec::with_capacity(node_count as usize);
    for _ in 0..node_count {
        nodes.push((r.read_i64()?, r.read_i64()?, r.read_u32()?, r.read_cstring()?));
    }
    Ok((blocks, nodes))
}
