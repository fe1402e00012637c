//! Unity type trees
//!
//! A type tree is the schema Unity stores next to serialized objects: a
//! depth-first flattened list of nodes, each carrying its nesting level,
//! type name, field name, fixed byte size and meta flags. Objects are
//! decoded by walking the tree (see [`codec`]).
//!
//! Two on-disk encodings exist:
//! - the blob format (metadata version >= 12, or exactly 10): a node array
//!   followed by a string buffer, with offsets optionally pointing into
//!   [`common_strings`]
//! - the legacy recursive format used by the remaining versions

pub mod codec;
pub mod common_strings;
mod reader;
mod writer;

pub use codec::{decode_object, encode_object};
pub use reader::{read_blob, read_legacy};
pub use writer::{write_blob, write_legacy};

/// `meta_flag` bit requesting 4-byte alignment after the node's value
pub const ALIGN_FLAG: u32 = 0x4000;

/// Whether metadata version `version` stores type trees as blobs
#[must_use]
pub fn uses_blob_format(version: u32) -> bool {
    version >= 12 || version == 10
}

/// One node of a flattened type tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTreeNode {
    pub version: u16,
    /// Nesting depth; the root is level 0
    pub level: u8,
    pub type_flags: u8,
    pub type_name: String,
    pub name: String,
    /// Fixed size in bytes, or -1 for variable-sized nodes
    pub byte_size: i32,
    pub index: i32,
    pub meta_flag: u32,
    /// Present only in version >= 19 blobs
    pub ref_type_hash: u64,
}

impl TypeTreeNode {
    #[must_use]
    pub fn new(level: u8, type_name: &str, name: &str, byte_size: i32) -> Self {
        Self {
            version: 1,
            level,
            type_flags: 0,
            type_name: type_name.to_string(),
            name: name.to_string(),
            byte_size,
            index: 0,
            meta_flag: 0,
            ref_type_hash: 0,
        }
    }

    /// Builder-style helper to set the alignment flag
    #[must_use]
    pub fn aligned(mut self) -> Self {
        self.meta_flag |= ALIGN_FLAG;
        self
    }

    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.meta_flag & ALIGN_FLAG != 0
    }
}

/// A flattened type tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeTree {
    pub nodes: Vec<TypeTreeNode>,
}

impl TypeTree {
    #[must_use]
    pub fn new(nodes: Vec<TypeTreeNode>) -> Self {
        Self { nodes }
    }

    #[must_use]
    pub fn root(&self) -> Option<&TypeTreeNode> {
        self.nodes.first()
    }

    /// Indices of the direct children of node `index`
    #[must_use]
    pub fn children(&self, index: usize) -> Vec<usize> {
        let Some(parent) = self.nodes.get(index) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (i, node) in self.nodes.iter().enumerate().skip(index + 1) {
            if node.level <= parent.level {
                break;
            }
            if node.level == parent.level + 1 {
                out.push(i);
            }
        }
        out
    }

    /// Index just past the subtree rooted at `index`
    #[must_use]
    pub fn subtree_end(&self, index: usize) -> usize {
        let Some(parent) = self.nodes.get(index) else {
            return self.nodes.len();
        };
        self.nodes
            .iter()
            .enumerate()
            .skip(index + 1)
            .find(|(_, n)| n.level <= parent.level)
            .map_or(self.nodes.len(), |(i, _)| i)
    }

    /// Check that levels form a single well-nested tree rooted at 0
    ///
    /// # Errors
    /// Returns [`crate::error::Error::InvalidTypeTree`] describing the first
    /// inconsistency.
    pub fn validate(&self) -> crate::error::Result<()> {
        let Some(root) = self.nodes.first() else {
            return Err(crate::error::Error::InvalidTypeTree("empty type tree".to_string()));
        };
        if root.level != 0 {
            return Err(crate::error::Error::InvalidTypeTree(format!(
                "root node has level {}",
                root.level
            )));
        }
        for pair in self.nodes.windows(2) {
            if pair[1].level == 0 {
                return Err(crate::error::Error::InvalidTypeTree("multiple root nodes".to_string()));
            }
            if pair[1].level > pair[0].level + 1 {
                return Err(crate::error::Error::InvalidTypeTree(format!(
                    "node '{}' skips from level {} to {}",
                    pair[1].name, pair[0].level, pair[1].level
                )));
            }
        }
        Ok(())
    }

    /// Append nodes, returning `self` for chaining
    #[must_use]
    pub fn with(mut self, nodes: impl IntoIterator<Item = TypeTreeNode>) -> Self {
        self.nodes.extend(nodes);
        self
    }
}

/// Helpers for assembling common node shapes
pub mod build {
    use super::{TypeTreeNode, ALIGN_FLAG};

    /// A `string` field: the node plus its `Array` of `char`
    #[must_use]
    pub fn string(level: u8, name: &str) -> Vec<TypeTreeNode> {
        vec![
            TypeTreeNode::new(level, "string", name, -1),
            TypeTreeNode {
                meta_flag: ALIGN_FLAG,
                ..TypeTreeNode::new(level + 1, "Array", "Array", -1)
            },
            TypeTreeNode::new(level + 2, "int", "size", 4),
            TypeTreeNode::new(level + 2, "char", "data", 1),
        ]
    }

    /// A `vector` of some element subtree, the element given at level 0
    #[must_use]
    pub fn vector(level: u8, name: &str, element: Vec<TypeTreeNode>, aligned: bool) -> Vec<TypeTreeNode> {
        let mut nodes = vec![
            TypeTreeNode::new(level, "vector", name, -1),
            TypeTreeNode {
                meta_flag: if aligned { ALIGN_FLAG } else { 0 },
                ..TypeTreeNode::new(level + 1, "Array", "Array", -1)
            },
            TypeTreeNode::new(level + 2, "int", "size", 4),
        ];
        nodes.extend(element.into_iter().map(|mut n| {
            n.level += level + 2;
            n
        }));
        nodes
    }

    /// A `PPtr<T>` reference; path ids are 64-bit from version 14
    #[must_use]
    pub fn pptr(level: u8, target: &str, name: &str, wide_path_id: bool) -> Vec<TypeTreeNode> {
        let (path_type, path_size) = if wide_path_id { ("SInt64", 8) } else { ("int", 4) };
        vec![
            TypeTreeNode::new(level, &format!("PPtr<{target}>"), name, 4 + path_size),
            TypeTreeNode::new(level + 1, "int", "m_FileID", 4),
            TypeTreeNode::new(level + 1, path_type, "m_PathID", path_size),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TypeTree {
        let mut nodes = vec![TypeTreeNode::new(0, "TextAsset", "Base", -1)];
        nodes.extend(build::string(1, "m_Name"));
        nodes.extend(build::string(1, "m_Script"));
        TypeTree::new(nodes)
    }

    #[test]
    fn test_children_and_subtree() {
        let tree = sample();
        assert_eq!(tree.children(0), vec![1, 5]);
        assert_eq!(tree.children(1), vec![2]);
        assert_eq!(tree.children(2), vec![3, 4]);
        assert_eq!(tree.subtree_end(1), 5);
        assert_eq!(tree.subtree_end(5), 9);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_level_jump() {
        let tree = TypeTree::new(vec![
            TypeTreeNode::new(0, "Base", "Base", -1),
            TypeTreeNode::new(2, "int", "x", 4),
        ]);
        assert!(tree.validate().is_err());
    }
}
