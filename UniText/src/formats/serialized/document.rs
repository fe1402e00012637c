//! SerializedFile document structure definitions

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::formats::typetree::{self, TypeTree};
use crate::formats::value::FieldValue;

use super::schema::{self, RAW_DATA_FIELD};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedHeader {
    pub metadata_size: u32,
    pub file_size: u64,
    pub version: u32,
    pub data_offset: u64,
    pub big_endian: bool,
}

impl SerializedHeader {
    /// Size of the on-disk header: 20 bytes, 48 from version 22
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        if self.version >= 22 { 48 } else { 20 }
    }
}

/// Class names a ref type carries from version 21
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefTypeNames {
    pub class_name: String,
    pub namespace: String,
    pub assembly: String,
}

/// One entry of the serialized type table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedType {
    pub class_id: i32,
    pub is_stripped: bool,
    pub script_type_index: i16,
    pub script_id: Option<[u8; 16]>,
    pub old_type_hash: Option<[u8; 16]>,
    pub type_tree: Option<TypeTree>,
    pub type_dependencies: Vec<i32>,
    pub ref_names: Option<RefTypeNames>,
}

impl SerializedType {
    #[must_use]
    pub fn new(class_id: i32, type_tree: Option<TypeTree>) -> Self {
        Self {
            class_id,
            is_stripped: false,
            script_type_index: -1,
            script_id: None,
            old_type_hash: None,
            type_tree,
            type_dependencies: Vec::new(),
            ref_names: None,
        }
    }
}

/// An object table entry together with the object's bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub path_id: i64,
    /// Absolute offset in the file the entry was read from
    pub byte_start: u64,
    pub type_id: i32,
    pub class_id: i32,
    pub is_destroyed: u16,
    pub script_type_index: i16,
    pub stripped: u8,
    pub data: Vec<u8>,
}

impl ObjectEntry {
    #[must_use]
    pub fn byte_size(&self) -> u32 {
        self.data.len() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRef {
    pub file_index: i32,
    pub path_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRef {
    pub asset_path: String,
    pub guid: [u8; 16],
    pub kind: i32,
    pub path: String,
}

/// A parsed Unity SerializedFile
///
/// Everything outside the object table is kept as raw bytes so it can be
/// re-emitted verbatim; only object data and their offsets ever change.
#[derive(Debug, Clone)]
pub struct SerializedFile {
    pub header: SerializedHeader,
    pub unity_version: String,
    pub target_platform: i32,
    pub enable_type_tree: bool,
    pub types: Vec<SerializedType>,
    pub big_id_enabled: bool,
    pub objects: Vec<ObjectEntry>,
    pub scripts: Vec<ScriptRef>,
    pub externals: Vec<ExternalRef>,
    pub ref_types: Vec<SerializedType>,
    pub user_info: String,
    pub(super) header_bytes: Vec<u8>,
    /// Metadata from the end of the header up to the object count
    pub(super) metadata_prefix: Vec<u8>,
    /// Metadata after the object table
    pub(super) metadata_suffix: Vec<u8>,
    /// Padding between the metadata and the data offset
    pub(super) data_gap: Vec<u8>,
}

impl SerializedFile {
    #[must_use]
    pub fn version(&self) -> u32 {
        self.header.version
    }

    #[must_use]
    pub fn object(&self, path_id: i64) -> Option<&ObjectEntry> {
        self.objects.iter().find(|o| o.path_id == path_id)
    }

    /// The serialized type describing `entry`
    #[must_use]
    pub fn object_type(&self, entry: &ObjectEntry) -> Option<&SerializedType> {
        if self.header.version >= 16 {
            usize::try_from(entry.type_id).ok().and_then(|i| self.types.get(i))
        } else {
            self.types.iter().find(|t| t.class_id == entry.type_id)
        }
    }

    /// Type name of `entry`, from the class id or its type tree root
    #[must_use]
    pub fn type_name(&self, entry: &ObjectEntry) -> String {
        if let Some(name) = schema::class_name(entry.class_id) {
            return name.to_string();
        }
        self.object_type(entry)
            .and_then(|t| t.type_tree.as_ref())
            .and_then(TypeTree::root)
            .map_or_else(|| format!("Class{}", entry.class_id), |r| r.type_name.clone())
    }

    /// The tree used to decode `entry`: embedded when present, built-in
    /// otherwise
    ///
    /// The second element is true when the built-in MonoBehaviour schema is
    /// used and script fields end up in an opaque trailing field.
    fn tree_for(&self, entry: &ObjectEntry) -> Result<(Cow<'_, TypeTree>, bool)> {
        if let Some(tree) = self
            .object_type(entry)
            .and_then(|t| t.type_tree.as_ref())
            .filter(|t| !t.nodes.is_empty())
        {
            return Ok((Cow::Borrowed(tree), false));
        }
        schema::builtin_tree(entry.class_id, &self.unity_version, self.header.version)
            .map(|tree| (Cow::Owned(tree), entry.class_id == schema::CLASS_MONO_BEHAVIOUR))
            .ok_or_else(|| {
                Error::InvalidTypeTree(format!(
                    "no type tree for object {} of class {}",
                    entry.path_id, entry.class_id
                ))
            })
    }

    /// Decode an object's fields
    ///
    /// # Errors
    /// Returns [`Error::ObjectNotFound`], or a decode error from the tree.
    pub fn decode(&self, path_id: i64) -> Result<FieldValue> {
        let entry = self.object(path_id).ok_or(Error::ObjectNotFound(path_id))?;
        let (tree, raw_tail) = self.tree_for(entry)?;
        let big_endian = self.header.big_endian;
        if !raw_tail {
            return typetree::decode_object(&tree, &entry.data, big_endian);
        }
        let (mut value, consumed) = typetree::codec::decode_prefix(&tree, &entry.data, big_endian)?;
        if let FieldValue::Map(map) = &mut value {
            map.insert(
                RAW_DATA_FIELD.to_string(),
                FieldValue::Bytes(entry.data[consumed..].to_vec()),
            );
        }
        Ok(value)
    }

    /// Number of bytes after the part of object `path_id` its tree describes
    ///
    /// Always zero under the built-in MonoBehaviour schema, where those bytes
    /// are surfaced as a field instead.
    ///
    /// # Errors
    /// Returns [`Error::ObjectNotFound`], or a decode error from the tree.
    pub fn unread_len(&self, path_id: i64) -> Result<usize> {
        let entry = self.object(path_id).ok_or(Error::ObjectNotFound(path_id))?;
        let (tree, raw_tail) = self.tree_for(entry)?;
        if raw_tail {
            return Ok(0);
        }
        let (_, consumed) = typetree::codec::decode_prefix(&tree, &entry.data, self.header.big_endian)?;
        Ok(entry.data.len() - consumed)
    }

    /// Encode `value` as the new data of object `path_id`
    ///
    /// Bytes the tree does not describe are carried over from the current
    /// data unchanged, after the re-encoded fields.
    ///
    /// # Errors
    /// Returns [`Error::ObjectNotFound`], a decode error when the current data
    /// no longer matches the tree, or an encode error from the tree.
    pub fn encode(&mut self, path_id: i64, value: &FieldValue) -> Result<()> {
        let entry = self.object(path_id).ok_or(Error::ObjectNotFound(path_id))?;
        let (tree, raw_tail) = self.tree_for(entry)?;
        let big_endian = self.header.big_endian;
        let mut data = typetree::encode_object(&tree, value, big_endian)?;
        if raw_tail {
            if let Some(FieldValue::Bytes(tail)) = value.get(RAW_DATA_FIELD) {
                data.extend_from_slice(tail);
            }
        } else {
            let (_, consumed) = typetree::codec::decode_prefix(&tree, &entry.data, big_endian)?;
            if consumed < entry.data.len() {
                tracing::debug!(
                    "Keeping {} unread trailing bytes of object {}",
                    entry.data.len() - consumed,
                    path_id
                );
                data.extend_from_slice(&entry.data[consumed..]);
            }
        }
        drop(tree);
        self.set_object_data(path_id, data)
    }

    /// Replace the bytes of object `path_id`
    ///
    /// # Errors
    /// Returns [`Error::ObjectNotFound`] if no such object exists.
    pub fn set_object_data(&mut self, path_id: i64, data: Vec<u8>) -> Result<()> {
        let entry = self
            .objects
            .iter_mut()
            .find(|o| o.path_id == path_id)
            .ok_or(Error::ObjectNotFound(path_id))?;
        entry.data = data;
        Ok(())
    }
}
