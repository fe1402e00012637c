//! UnityFS asset bundle reader/writer
//!
//! A bundle is a big-endian header, a (usually compressed) blocks-info
//! table describing storage blocks and directory nodes, and the block
//! data. Decompressing and concatenating the blocks yields one stream the
//! nodes slice into; nodes flagged as serialized files hold SerializedFiles.

mod reader;
mod types;
mod writer;

pub use reader::{parse_bundle_bytes, read_bundle};
pub use types::*;
pub use writer::{serialize_bundle, BundleWriter};

/// Bundle signature, NUL-terminated on disk
pub const SIGNATURE: &str = "UnityFS";

/// Minimum supported UnityFS format version
pub const MIN_VERSION: u32 = 6;

/// Maximum supported UnityFS format version
pub const MAX_VERSION: u32 = 8;

/// Blocks info is stored at the end of the file
pub const FLAG_BLOCKS_INFO_AT_END: u32 = 0x80;

/// Blocks and directory info are combined (always set by Unity 5.3+)
pub const FLAG_BLOCKS_AND_DIRECTORY_COMBINED: u32 = 0x40;

/// Block data is preceded by padding to 16 bytes
pub const FLAG_BLOCK_INFO_NEEDS_PADDING: u32 = 0x200;

/// Mask of the compression type in header and block flags
pub const COMPRESSION_MASK: u32 = 0x3F;

/// Directory node flag marking a serialized file
pub const NODE_FLAG_SERIALIZED: u32 = 0x4;

/// Uncompressed size of blocks written by [`BundleWriter`]
pub const BLOCK_SIZE: usize = 0x20000;

/// Whether `data` starts with the UnityFS signature
#[must_use]
pub fn is_bundle(data: &[u8]) -> bool {
    data.len() > SIGNATURE.len() && data.starts_with(SIGNATURE.as_bytes()) && data[SIGNATURE.len()] == 0
}
