//! Construction of fresh SerializedFiles
//!
//! Used by tooling and tests to produce well-formed containers without
//! binary fixtures.

use super::document::{ObjectEntry, SerializedType};
use super::reader::{MAX_VERSION, MIN_VERSION};
use super::writer::{layout_objects, patch_file_size, write_object_data, write_object_table};
use crate::error::{Error, Result};
use crate::formats::binary::{align_up, EndianWriter};
use crate::formats::typetree::{self, TypeTree};
use crate::formats::value::FieldValue;

/// Builder for a SerializedFile
#[derive(Debug, Clone)]
pub struct SerializedFileBuilder {
    version: u32,
    unity_version: String,
    target_platform: i32,
    big_endian: bool,
    enable_type_tree: bool,
    types: Vec<SerializedType>,
    objects: Vec<ObjectEntry>,
}

impl SerializedFileBuilder {
    /// Start a file of metadata version `version` (9 to 22)
    #[must_use]
    pub fn new(version: u32, unity_version: &str) -> Self {
        Self {
            version,
            unity_version: unity_version.to_string(),
            target_platform: 19,
            big_endian: false,
            enable_type_tree: true,
            types: Vec::new(),
            objects: Vec::new(),
        }
    }

    #[must_use]
    pub fn big_endian(mut self, big_endian: bool) -> Self {
        self.big_endian = big_endian;
        self
    }

    /// Whether type trees are written; only honoured from version 13
    #[must_use]
    pub fn type_trees(mut self, enabled: bool) -> Self {
        self.enable_type_tree = enabled;
        self
    }

    /// Register a type and return its type id for [`Self::add_object`]
    ///
    /// Before version 16 objects reference types by class id rather than by
    /// index, so the class id is returned instead.
    pub fn add_type(&mut self, class_id: i32, tree: TypeTree) -> i32 {
        let mut ty = SerializedType::new(class_id, Some(tree));
        if self.version >= 13 {
            ty.old_type_hash = Some([0; 16]);
            if (self.version >= 16 && class_id == super::schema::CLASS_MONO_BEHAVIOUR)
                || (self.version < 16 && class_id < 0)
            {
                ty.script_id = Some([0; 16]);
            }
        }
        self.types.push(ty);
        if self.version >= 16 {
            (self.types.len() - 1) as i32
        } else {
            class_id
        }
    }

    fn type_for(&self, type_id: i32) -> Option<&SerializedType> {
        if self.version >= 16 {
            usize::try_from(type_id).ok().and_then(|i| self.types.get(i))
        } else {
            self.types.iter().find(|t| t.class_id == type_id)
        }
    }

    /// Add an object with raw bytes
    ///
    /// # Errors
    /// Returns [`Error::UnknownTypeIndex`] if `type_id` was not registered.
    pub fn add_object(&mut self, path_id: i64, type_id: i32, data: Vec<u8>) -> Result<&mut Self> {
        let class_id = self
            .type_for(type_id)
            .map(|t| t.class_id)
            .ok_or(Error::UnknownTypeIndex { path_id, type_index: type_id })?;
        self.objects.push(ObjectEntry {
            path_id,
            byte_start: 0,
            type_id,
            class_id,
            is_destroyed: 0,
            script_type_index: -1,
            stripped: 0,
            data,
        });
        Ok(self)
    }

    /// Add an object encoded from `value` through the type's tree
    ///
    /// # Errors
    /// Returns [`Error::UnknownTypeIndex`] or an encode error.
    pub fn add_value(&mut self, path_id: i64, type_id: i32, value: &FieldValue) -> Result<&mut Self> {
        let tree = self
            .type_for(type_id)
            .and_then(|t| t.type_tree.as_ref())
            .ok_or(Error::UnknownTypeIndex { path_id, type_index: type_id })?;
        let data = typetree::encode_object(tree, value, self.big_endian)?;
        self.add_object(path_id, type_id, data)
    }

    fn write_type(&self, w: &mut EndianWriter, ty: &SerializedType, type_trees: bool) {
        let version = self.version;
        w.write_i32(ty.class_id);
        if version >= 16 {
            w.write_bool(ty.is_stripped);
        }
        if version >= 17 {
            w.write_i16(ty.script_type_index);
        }
        if version >= 13 {
            if let Some(script_id) = &ty.script_id {
                w.write_bytes(script_id);
            }
            w.write_bytes(&ty.old_type_hash.unwrap_or_default());
        }
        if type_trees {
            let empty = TypeTree::default();
            let tree = ty.type_tree.as_ref().unwrap_or(&empty);
            if typetree::uses_blob_format(version) {
                typetree::write_blob(w, tree, version);
            } else {
                typetree::write_legacy(w, tree);
            }
            if version >= 21 {
                w.write_i32(ty.type_dependencies.len() as i32);
                for dep in &ty.type_dependencies {
                    w.write_i32(*dep);
                }
            }
        }
    }

    /// Produce the file bytes
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedSerializedVersion`] for versions outside
    /// 9 to 22.
    pub fn build(&self) -> Result<Vec<u8>> {
        let version = self.version;
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(Error::UnsupportedSerializedVersion(version));
        }
        let header_len = if version >= 22 { 48 } else { 20 };
        let type_trees = self.enable_type_tree || version < 13;

        let mut w = EndianWriter::new(self.big_endian);
        w.write_bytes(&vec![0u8; header_len]);
        w.write_cstring(&self.unity_version);
        w.write_i32(self.target_platform);
        if version >= 13 {
            w.write_bool(self.enable_type_tree);
        }
        w.write_i32(self.types.len() as i32);
        for ty in &self.types {
            self.write_type(&mut w, ty, type_trees);
        }
        if (7..14).contains(&version) {
            w.write_i32(0);
        }

        let starts = layout_objects(&self.objects);
        write_object_table(&mut w, version, false, &self.objects, &starts);

        if version >= 11 {
            w.write_i32(0); // scripts
        }
        w.write_i32(0); // externals
        if version >= 20 {
            w.write_i32(0); // ref types
        }
        w.write_cstring(""); // user info

        let metadata_size = (w.len() - header_len) as u32;
        let data_offset = align_up(w.len() as u64, 16);
        let mut out = w.into_inner();
        out.resize(data_offset as usize, 0);
        write_object_data(&mut out, data_offset, &self.objects, &starts);

        let mut header = EndianWriter::new(true);
        if version >= 22 {
            header.write_u32(0);
            header.write_u32(0);
            header.write_u32(version);
            header.write_u32(0);
        } else {
            header.write_u32(metadata_size);
            header.write_u32(0);
            header.write_u32(version);
            header.write_u32(data_offset as u32);
        }
        header.write_u8(u8::from(self.big_endian));
        header.write_bytes(&[0; 3]);
        if version >= 22 {
            header.write_u32(metadata_size);
            header.write_u64(0);
            header.write_u64(data_offset);
            header.write_u64(0);
        }
        out[..header_len].copy_from_slice(&header.into_inner());
        patch_file_size(&mut out, version);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::serialized::{parse_serialized_bytes, schema, serialize_serialized};
    use crate::formats::typetree::build;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn text_asset(name: &str, script: &str) -> FieldValue {
        let mut map = IndexMap::new();
        map.insert("m_Name".to_string(), FieldValue::String(name.to_string()));
        map.insert("m_Script".to_string(), FieldValue::String(script.to_string()));
        FieldValue::Map(map)
    }

    fn sample(version: u32, big_endian: bool) -> Vec<u8> {
        let mut builder = SerializedFileBuilder::new(version, "2019.4.40f1").big_endian(big_endian);
        let tree = TypeTree::new(vec![typetree::TypeTreeNode::new(0, "TextAsset", "Base", -1)])
            .with(build::string(1, "m_Name"))
            .with(build::string(1, "m_Script"));
        let ty = builder.add_type(schema::CLASS_TEXT_ASSET, tree);
        builder.add_value(1, ty, &text_asset("intro", "Hello, traveller.")).unwrap();
        builder.add_value(7, ty, &text_asset("outro", "Farewell!")).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_built_files_parse_across_versions() {
        for version in [9, 11, 14, 15, 17, 19, 21, 22] {
            for big in [false, true] {
                let bytes = sample(version, big);
                let file = parse_serialized_bytes(&bytes).unwrap();
                assert_eq!(file.version(), version);
                assert_eq!(file.objects.len(), 2);
                assert_eq!(file.objects[1].path_id, 7);
                assert_eq!(file.objects[1].class_id, schema::CLASS_TEXT_ASSET);
                let value = file.decode(7).unwrap();
                assert_eq!(value, text_asset("outro", "Farewell!"));
            }
        }
    }

    #[test]
    fn test_unmodified_reserialize_is_identical() {
        for version in [9, 15, 22] {
            let bytes = sample(version, false);
            let file = parse_serialized_bytes(&bytes).unwrap();
            assert_eq!(serialize_serialized(&file).unwrap(), bytes);
        }
    }

    #[test]
    fn test_resized_object_shifts_followers() {
        let bytes = sample(21, false);
        let mut file = parse_serialized_bytes(&bytes).unwrap();
        file.encode(1, &text_asset("intro", "A much longer greeting than before")).unwrap();
        let out = serialize_serialized(&file).unwrap();

        let reloaded = parse_serialized_bytes(&out).unwrap();
        assert_eq!(reloaded.objects.len(), 2);
        assert_eq!(reloaded.objects[1].data, file.objects[1].data);
        assert_eq!(reloaded.objects[1].byte_start % 8, reloaded.header.data_offset % 8);
        assert_eq!(reloaded.header.file_size, out.len() as u64);
        assert_eq!(reloaded.decode(1).unwrap(), text_asset("intro", "A much longer greeting than before"));
    }

    #[test]
    fn test_mono_behaviour_without_type_tree_keeps_raw_tail() {
        let pptr = |path_id: i64| {
            let mut m = IndexMap::new();
            m.insert("m_FileID".to_string(), FieldValue::Int(0));
            m.insert("m_PathID".to_string(), FieldValue::Int(path_id));
            FieldValue::Map(m)
        };
        let mut base = IndexMap::new();
        base.insert("m_GameObject".to_string(), pptr(3));
        base.insert("m_Enabled".to_string(), FieldValue::Int(1));
        base.insert("m_Script".to_string(), pptr(9));
        base.insert("m_Name".to_string(), FieldValue::String("QuestLog".to_string()));
        let base = FieldValue::Map(base);

        let mut data = typetree::encode_object(&schema::mono_behaviour_tree(17), &base, false).unwrap();
        data.extend_from_slice(&[1, 2, 3, 4, 5]);

        let mut builder = SerializedFileBuilder::new(17, "2020.3.1f1").type_trees(false);
        let ty = builder.add_type(schema::CLASS_MONO_BEHAVIOUR, TypeTree::default());
        builder.add_object(2, ty, data.clone()).unwrap();
        let mut file = parse_serialized_bytes(&builder.build().unwrap()).unwrap();
        assert!(!file.enable_type_tree);

        let value = file.decode(2).unwrap();
        assert_eq!(value.get("m_Name"), Some(&FieldValue::String("QuestLog".into())));
        assert_eq!(value.get(schema::RAW_DATA_FIELD), Some(&FieldValue::Bytes(vec![1, 2, 3, 4, 5])));

        file.encode(2, &value).unwrap();
        assert_eq!(file.object(2).unwrap().data, data);
    }

    #[test]
    fn test_embedded_tree_keeps_unread_tail_on_encode() {
        let tree = TypeTree::new(vec![typetree::TypeTreeNode::new(0, "TextAsset", "Base", -1)])
            .with(build::string(1, "m_Name"))
            .with(build::string(1, "m_Script"));
        let mut data = typetree::encode_object(&tree, &text_asset("intro", "Hello"), false).unwrap();
        data.extend_from_slice(&[0xAB; 8]);

        let mut builder = SerializedFileBuilder::new(21, "2021.3.4f1");
        let ty = builder.add_type(schema::CLASS_TEXT_ASSET, tree);
        builder.add_object(1, ty, data).unwrap();
        let mut file = parse_serialized_bytes(&builder.build().unwrap()).unwrap();
        assert_eq!(file.unread_len(1).unwrap(), 8);

        file.encode(1, &text_asset("intro", "Bonjour tout le monde")).unwrap();
        let reloaded = parse_serialized_bytes(&serialize_serialized(&file).unwrap()).unwrap();
        assert_eq!(reloaded.decode(1).unwrap(), text_asset("intro", "Bonjour tout le monde"));
        assert_eq!(reloaded.unread_len(1).unwrap(), 8);
        assert!(reloaded.object(1).unwrap().data.ends_with(&[0xAB; 8]));
    }

    #[test]
    fn test_unsupported_builder_version() {
        assert!(SerializedFileBuilder::new(8, "5.0.0f1").build().is_err());
    }
}
