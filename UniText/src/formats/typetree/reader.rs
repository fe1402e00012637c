//! Type tree parsing (blob and legacy encodings)

use super::common_strings::{self, COMMON_STRING_FLAG};
use super::{TypeTree, TypeTreeNode};
use crate::error::{Error, Result};
use crate::formats::binary::EndianReader;

/// Nodes are 24 bytes, plus an 8-byte ref type hash from version 19
fn node_stride(version: u32) -> usize {
    if version >= 19 { 32 } else { 24 }
}

/// Read a blob-encoded type tree at the reader's position
///
/// # Errors
/// Returns [`Error::InvalidTypeTree`] for implausible counts or string
/// offsets, or [`Error::UnexpectedEof`] on truncation.
pub fn read_blob(reader: &mut EndianReader<'_>, version: u32) -> Result<TypeTree> {
    let node_count = reader.read_i32()?;
    let string_buffer_size = reader.read_i32()?;
    if node_count < 0 || string_buffer_size < 0 {
        return Err(Error::InvalidTypeTree(format!(
            "negative sizes: {node_count} nodes, {string_buffer_size} string bytes"
        )));
    }
    let node_count = node_count as usize;
    let string_buffer_size = string_buffer_size as usize;
    if node_count * node_stride(version) + string_buffer_size > reader.remaining() {
        return Err(Error::InvalidTypeTree(format!(
            "{node_count} nodes and {string_buffer_size} string bytes exceed the remaining {} bytes",
            reader.remaining()
        )));
    }

    struct RawNode {
        version: u16,
        level: u8,
        type_flags: u8,
        type_offset: u32,
        name_offset: u32,
        byte_size: i32,
        index: i32,
        meta_flag: u32,
        ref_type_hash: u64,
    }

    let mut raw = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        raw.push(RawNode {
            version: reader.read_u16()?,
            level: reader.read_u8()?,
            type_flags: reader.read_u8()?,
            type_offset: reader.read_u32()?,
            name_offset: reader.read_u32()?,
            byte_size: reader.read_i32()?,
            index: reader.read_i32()?,
            meta_flag: reader.read_u32()?,
            ref_type_hash: if version >= 19 { reader.read_u64()? } else { 0 },
        });
    }
    let strings = reader.read_bytes(string_buffer_size)?;

    let nodes = raw
        .into_iter()
        .map(|n| {
            Ok(TypeTreeNode {
                version: n.version,
                level: n.level,
                type_flags: n.type_flags,
                type_name: resolve_string(&strings, n.type_offset)?,
                name: resolve_string(&strings, n.name_offset)?,
                byte_size: n.byte_size,
                index: n.index,
                meta_flag: n.meta_flag,
                ref_type_hash: n.ref_type_hash,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let tree = TypeTree::new(nodes);
    tree.validate()?;
    Ok(tree)
}

fn resolve_string(buffer: &[u8], offset: u32) -> Result<String> {
    if offset & COMMON_STRING_FLAG != 0 {
        let common = offset & !COMMON_STRING_FLAG;
        return common_strings::lookup(common)
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidTypeTree(format!("unknown common string offset {common}")));
    }
    let start = offset as usize;
    let rest = buffer
        .get(start..)
        .ok_or_else(|| Error::InvalidTypeTree(format!("string offset {start} outside buffer")))?;
    let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
}

/// Guards the legacy recursion against corrupt child counts
const MAX_LEGACY_DEPTH: u8 = 64;

/// Read a legacy (recursive) type tree at the reader's position
///
/// # Errors
/// Returns [`Error::InvalidTypeTree`] for implausible child counts or
/// nesting, or [`Error::UnexpectedEof`] on truncation.
pub fn read_legacy(reader: &mut EndianReader<'_>) -> Result<TypeTree> {
    let mut nodes = Vec::new();
    read_legacy_node(reader, 0, &mut nodes)?;
    Ok(TypeTree::new(nodes))
}

fn read_legacy_node(reader: &mut EndianReader<'_>, level: u8, nodes: &mut Vec<TypeTreeNode>) -> Result<()> {
    if level > MAX_LEGACY_DEPTH {
        return Err(Error::InvalidTypeTree("legacy type tree nested too deeply".to_string()));
    }
    let type_name = reader.read_cstring()?;
    let name = reader.read_cstring()?;
    let byte_size = reader.read_i32()?;
    let index = reader.read_i32()?;
    let type_flags = reader.read_i32()?;
    let version = reader.read_i32()?;
    let meta_flag = reader.read_u32()?;
    let children = reader.read_i32()?;
    // Each child needs at least two terminators and six ints
    if children < 0 || children as usize * 26 > reader.remaining() {
        return Err(Error::InvalidTypeTree(format!(
            "node '{name}' declares {children} children"
        )));
    }
    nodes.push(TypeTreeNode {
        version: version as u16,
        level,
        type_flags: type_flags as u8,
        type_name,
        name,
        byte_size,
        index,
        meta_flag,
        ref_type_hash: 0,
    });
    for _ in 0..children {
        read_legacy_node(reader, level + 1, nodes)?;
    }
    Ok(())
}
