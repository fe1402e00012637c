//! Types for UnityFS bundle handling

use crate::compression::lz4;
use crate::error::{Error, Result};

use super::{COMPRESSION_MASK, NODE_FLAG_SERIALIZED};

/// Compression method of the blocks info or a storage block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    None,
    Lzma,
    Lz4,
    Lz4Hc,
}

impl CompressionMethod {
    /// Parse the compression method from header or block flags
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedCompressionMethod`] for unknown types.
    pub fn from_flags(flags: u32) -> Result<Self> {
        match flags & COMPRESSION_MASK {
            0 => Ok(CompressionMethod::None),
            1 => Ok(CompressionMethod::Lzma),
            2 => Ok(CompressionMethod::Lz4),
            3 => Ok(CompressionMethod::Lz4Hc),
            method => Err(Error::UnsupportedCompressionMethod { method }),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionMethod::None => "none",
            CompressionMethod::Lzma => "lzma",
            CompressionMethod::Lz4 => "lz4",
            CompressionMethod::Lz4Hc => "lz4hc",
        }
    }

    #[must_use]
    pub fn to_flags(self) -> u32 {
        match self {
            CompressionMethod::None => 0,
            CompressionMethod::Lzma => 1,
            CompressionMethod::Lz4 => 2,
            CompressionMethod::Lz4Hc => 3,
        }
    }

    #[must_use]
    pub fn is_lz4(self) -> bool {
        matches!(self, CompressionMethod::Lz4 | CompressionMethod::Lz4Hc)
    }

    /// Decompress `data` to exactly `size` bytes
    ///
    /// # Errors
    /// LZMA is recognised but not decoded and yields
    /// [`Error::UnsupportedCompressionMethod`].
    pub fn decompress(self, data: &[u8], size: usize) -> Result<Vec<u8>> {
        match self {
            CompressionMethod::None => {
                if data.len() != size {
                    return Err(Error::DecompressionError(format!(
                        "stored block holds {} bytes, expected {size}",
                        data.len()
                    )));
                }
                Ok(data.to_vec())
            }
            CompressionMethod::Lz4 | CompressionMethod::Lz4Hc => lz4::decompress_block(data, size),
            CompressionMethod::Lzma => Err(Error::UnsupportedCompressionMethod { method: self.to_flags() }),
        }
    }
}

/// Bundle file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleHeader {
    pub format_version: u32,
    pub unity_version: String,
    pub unity_revision: String,
    pub size: i64,
    pub compressed_blocks_info_size: u32,
    pub uncompressed_blocks_info_size: u32,
    pub flags: u32,
}

impl BundleHeader {
    /// Compression of the blocks info table
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedCompressionMethod`] for unknown types.
    pub fn blocks_info_compression(&self) -> Result<CompressionMethod> {
        CompressionMethod::from_flags(self.flags)
    }
}

/// A storage block descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageBlock {
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    pub flags: u16,
}

/// A directory node: a file stored in the bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    pub path: String,
    pub flags: u32,
    pub data: Vec<u8>,
}

impl BundleEntry {
    #[must_use]
    pub fn is_serialized(&self) -> bool {
        self.flags & NODE_FLAG_SERIALIZED != 0
    }
}

/// A parsed bundle with its entries decompressed
#[derive(Debug, Clone)]
pub struct Bundle {
    pub header: BundleHeader,
    /// Compression of the first storage block, reused when re-packing
    pub block_compression: CompressionMethod,
    pub entries: Vec<BundleEntry>,
}

impl Bundle {
    #[must_use]
    pub fn entry(&self, path: &str) -> Option<&BundleEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Replace an entry's bytes
    ///
    /// # Errors
    /// Returns [`Error::InvalidPath`] if the bundle has no such entry.
    pub fn set_entry_data(&mut self, path: &str, data: Vec<u8>) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.path == path)
            .ok_or_else(|| Error::InvalidPath(format!("bundle entry {path}")))?;
        entry.data = data;
        Ok(())
    }
}
