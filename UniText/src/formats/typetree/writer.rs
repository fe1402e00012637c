//! Type tree serialization
//!
//! Used by the file builder; the SerializedFile writer never re-encodes
//! type trees of files it loaded.

use std::collections::HashMap;

use super::common_strings::{self, COMMON_STRING_FLAG};
use super::TypeTree;
use crate::formats::binary::EndianWriter;

/// Write `tree` in the blob encoding
///
/// Names found in the common string table are referenced there; all
/// others go to the local buffer, deduplicated.
pub fn write_blob(writer: &mut EndianWriter, tree: &TypeTree, version: u32) {
    let mut buffer = Vec::new();
    let mut local = HashMap::new();
    let offsets: Vec<(u32, u32)> = tree
        .nodes
        .iter()
        .map(|node| {
            (
                string_offset(&node.type_name, &mut buffer, &mut local),
                string_offset(&node.name, &mut buffer, &mut local),
            )
        })
        .collect();

    writer.write_i32(tree.nodes.len() as i32);
    writer.write_i32(buffer.len() as i32);
    for (node, (type_offset, name_offset)) in tree.nodes.iter().zip(offsets) {
        writer.write_u16(node.version);
        writer.write_u8(node.level);
        writer.write_u8(node.type_flags);
        writer.write_u32(type_offset);
        writer.write_u32(name_offset);
        writer.write_i32(node.byte_size);
        writer.write_i32(node.index);
        writer.write_u32(node.meta_flag);
        if version >= 19 {
            writer.write_u64(node.ref_type_hash);
        }
    }
    writer.write_bytes(&buffer);
}

fn string_offset(s: &str, buffer: &mut Vec<u8>, local: &mut HashMap<String, u32>) -> u32 {
    if let Some(common) = common_strings::offset_of(s) {
        return common | COMMON_STRING_FLAG;
    }
    if let Some(&existing) = local.get(s) {
        return existing;
    }
    let offset = buffer.len() as u32;
    buffer.extend_from_slice(s.as_bytes());
    buffer.push(0);
    local.insert(s.to_string(), offset);
    offset
}

/// Write `tree` in the legacy recursive encoding
pub fn write_legacy(writer: &mut EndianWriter, tree: &TypeTree) {
    if !tree.nodes.is_empty() {
        write_legacy_node(writer, tree, 0);
    }
}

fn write_legacy_node(writer: &mut EndianWriter, tree: &TypeTree, index: usize) {
    let node = &tree.nodes[index];
    let children = tree.children(index);
    writer.write_cstring(&node.type_name);
    writer.write_cstring(&node.name);
    writer.write_i32(node.byte_size);
    writer.write_i32(node.index);
    writer.write_i32(i32::from(node.type_flags));
    writer.write_i32(i32::from(node.version));
    writer.write_u32(node.meta_flag);
    writer.write_i32(children.len() as i32);
    for child in children {
        write_legacy_node(writer, tree, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::binary::EndianReader;
    use crate::formats::typetree::{build, read_blob, read_legacy, TypeTreeNode};
    use pretty_assertions::assert_eq;

    fn dialogue_tree() -> TypeTree {
        let line = {
            let mut nodes = vec![TypeTreeNode::new(0, "DialogueLine", "data", -1)];
            nodes.extend(build::string(1, "speakerName"));
            nodes.extend(build::string(1, "text"));
            nodes
        };
        TypeTree::new(vec![TypeTreeNode::new(0, "MonoBehaviour", "Base", -1)])
            .with(build::string(1, "m_Name"))
            .with(build::vector(1, "lines", line, true))
    }

    #[test]
    fn test_blob_roundtrip_with_local_strings() {
        for version in [17, 19, 22] {
            let tree = dialogue_tree();
            let mut w = EndianWriter::new(false);
            write_blob(&mut w, &tree, version);
            let bytes = w.into_inner();
            let mut r = EndianReader::new(&bytes, false);
            assert_eq!(read_blob(&mut r, version).unwrap(), tree);
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn test_legacy_roundtrip() {
        let tree = dialogue_tree();
        let mut w = EndianWriter::new(true);
        write_legacy(&mut w, &tree);
        let bytes = w.into_inner();
        let mut r = EndianReader::new(&bytes, true);
        assert_eq!(read_legacy(&mut r).unwrap(), tree);
    }
}
