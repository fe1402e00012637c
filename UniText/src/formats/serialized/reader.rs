//! SerializedFile reading and parsing
//!
//! Supports metadata versions 9 through 22.

use std::fs;
use std::path::Path;

use super::document::{
    ExternalRef, ObjectEntry, RefTypeNames, ScriptRef, SerializedFile, SerializedHeader, SerializedType,
};
use crate::error::{Error, Result};
use crate::formats::binary::EndianReader;
use crate::formats::typetree;

pub const MIN_VERSION: u32 = 9;
pub const MAX_VERSION: u32 = 22;

/// Read a SerializedFile from disk
///
/// # Errors
/// Returns an error if the file cannot be read or has an invalid format.
pub fn read_serialized<P: AsRef<Path>>(path: P) -> Result<SerializedFile> {
    let data = fs::read(path)?;
    parse_serialized_bytes(&data)
}

fn read_header(data: &[u8]) -> Result<SerializedHeader> {
    if data.len() < 20 {
        return Err(Error::InvalidSerializedHeader(format!("{} bytes is too short", data.len())));
    }
    let mut r = EndianReader::new(data, true);
    let mut metadata_size = r.read_u32()?;
    let mut file_size = u64::from(r.read_u32()?);
    let version = r.read_u32()?;
    let mut data_offset = u64::from(r.read_u32()?);

    if version == 0 || version > 100 {
        return Err(Error::InvalidSerializedHeader(format!("implausible version {version}")));
    }
    if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
        return Err(Error::UnsupportedSerializedVersion(version));
    }

    let endian = r.read_u8()?;
    r.skip(3)?;
    if endian > 1 {
        return Err(Error::InvalidSerializedHeader(format!("endianness flag {endian}")));
    }
    if version >= 22 {
        metadata_size = r.read_u32()?;
        file_size = r.read_u64()?;
        data_offset = r.read_u64()?;
        r.skip(8)?;
    }

    let len = data.len() as u64;
    if file_size > len {
        return Err(Error::InvalidSerializedHeader(format!(
            "declares {file_size} bytes but only {len} are available"
        )));
    }
    if data_offset > file_size || u64::from(metadata_size) > file_size {
        return Err(Error::InvalidSerializedHeader(format!(
            "data offset {data_offset} / metadata size {metadata_size} exceed file size {file_size}"
        )));
    }

    Ok(SerializedHeader {
        metadata_size,
        file_size,
        version,
        data_offset,
        big_endian: endian == 1,
    })
}

/// Read one serialized type entry
///
/// # Errors
/// Returns an error on truncation or a malformed type tree.
pub(super) fn read_serialized_type(
    r: &mut EndianReader<'_>,
    version: u32,
    enable_type_tree: bool,
    is_ref_type: bool,
) -> Result<SerializedType> {
    let class_id = r.read_i32()?;
    let is_stripped = if version >= 16 { r.read_bool()? } else { false };
    let script_type_index = if version >= 17 { r.read_i16()? } else { -1 };

    let mut script_id = None;
    let mut old_type_hash = None;
    if version >= 13 {
        let has_script_id = (is_ref_type && script_type_index >= 0)
            || (version < 16 && class_id < 0)
            || (version >= 16 && class_id == super::schema::CLASS_MONO_BEHAVIOUR);
        if has_script_id {
            script_id = Some(r.read_array::<16>()?);
        }
        old_type_hash = Some(r.read_array::<16>()?);
    }

    let mut type_tree = None;
    let mut type_dependencies = Vec::new();
    let mut ref_names = None;
    if enable_type_tree {
        type_tree = Some(if typetree::uses_blob_format(version) {
            typetree::read_blob(r, version)?
        } else {
            typetree::read_legacy(r)?
        });
        if version >= 21 {
            if is_ref_type {
                ref_names = Some(RefTypeNames {
                    class_name: r.read_cstring()?,
                    namespace: r.read_cstring()?,
                    assembly: r.read_cstring()?,
                });
            } else {
                let count = read_count(r, 4)?;
                type_dependencies = (0..count).map(|_| r.read_i32()).collect::<Result<_>>()?;
            }
        }
    }

    Ok(SerializedType {
        class_id,
        is_stripped,
        script_type_index,
        script_id,
        old_type_hash,
        type_tree,
        type_dependencies,
        ref_names,
    })
}

/// Read an i32 element count, rejecting counts the remaining data cannot
/// hold at `min_element_size` bytes apiece
fn read_count(r: &mut EndianReader<'_>, min_element_size: usize) -> Result<usize> {
    let offset = r.position();
    let count = r.read_i32()?;
    if count < 0 || count as usize * min_element_size > r.remaining() {
        return Err(Error::InvalidSerializedHeader(format!("implausible count {count} at offset {offset}")));
    }
    Ok(count as usize)
}

/// Parse a SerializedFile from bytes
///
/// # Errors
/// Returns a load error (see [`Error::is_load_error`]) when the header,
/// metadata or object table is invalid.
pub fn parse_serialized_bytes(data: &[u8]) -> Result<SerializedFile> {
    let header = read_header(data)?;
    let version = header.version;
    let header_len = header.encoded_len();
    // Metadata is bounded by the data offset
    let metadata_end_limit = if header.data_offset as usize >= header_len {
        header.data_offset as usize
    } else {
        header.file_size as usize
    };
    let metadata = &data[..metadata_end_limit];

    let mut r = EndianReader::new(metadata, header.big_endian);
    r.set_position(header_len as u64);

    let unity_version = r.read_cstring()?;
    let target_platform = r.read_i32()?;
    let enable_type_tree = if version >= 13 { r.read_bool()? } else { true };

    let type_count = read_count(&mut r, 4)?;
    let mut types = Vec::with_capacity(type_count);
    for _ in 0..type_count {
        types.push(read_serialized_type(&mut r, version, enable_type_tree, false)?);
    }

    let big_id_enabled = if (7..14).contains(&version) { r.read_i32()? != 0 } else { false };
    let prefix_end = r.position() as usize;

    let object_count = read_count(&mut r, 12)?;
    let mut objects = Vec::with_capacity(object_count);
    for _ in 0..object_count {
        let path_id = if big_id_enabled {
            r.read_i64()?
        } else if version < 14 {
            i64::from(r.read_i32()?)
        } else {
            r.align(4)?;
            r.read_i64()?
        };
        let relative_start = if version >= 22 {
            r.read_u64()?
        } else {
            u64::from(r.read_u32()?)
        };
        let byte_start = relative_start.saturating_add(header.data_offset);
        let byte_size = r.read_u32()?;
        let type_id = r.read_i32()?;
        let raw_class_id = if version < 16 { Some(r.read_u16()?) } else { None };
        let is_destroyed = if version < 11 { r.read_u16()? } else { 0 };
        let script_type_index = if (11..17).contains(&version) { r.read_i16()? } else { -1 };
        let stripped = if version == 15 || version == 16 { r.read_u8()? } else { 0 };

        let class_id = match raw_class_id {
            Some(id) => i32::from(id),
            None => {
                let ty = usize::try_from(type_id)
                    .ok()
                    .and_then(|i| types.get(i))
                    .ok_or(Error::UnknownTypeIndex { path_id, type_index: type_id })?;
                ty.class_id
            }
        };

        let end = byte_start.saturating_add(u64::from(byte_size));
        if end > header.file_size {
            return Err(Error::ObjectOutOfBounds { path_id, start: byte_start, end });
        }
        objects.push(ObjectEntry {
            path_id,
            byte_start,
            type_id,
            class_id,
            is_destroyed,
            script_type_index,
            stripped,
            data: data[byte_start as usize..end as usize].to_vec(),
        });
    }
    let table_end = r.position() as usize;

    let mut scripts = Vec::new();
    if version >= 11 {
        let count = read_count(&mut r, 8)?;
        for _ in 0..count {
            let file_index = r.read_i32()?;
            let path_id = if version < 14 {
                i64::from(r.read_i32()?)
            } else {
                r.align(4)?;
                r.read_i64()?
            };
            scripts.push(ScriptRef { file_index, path_id });
        }
    }

    let external_count = read_count(&mut r, 22)?;
    let mut externals = Vec::with_capacity(external_count);
    for _ in 0..external_count {
        externals.push(ExternalRef {
            asset_path: r.read_cstring()?,
            guid: r.read_array::<16>()?,
            kind: r.read_i32()?,
            path: r.read_cstring()?,
        });
    }

    let mut ref_types = Vec::new();
    if version >= 20 {
        let count = read_count(&mut r, 4)?;
        for _ in 0..count {
            ref_types.push(read_serialized_type(&mut r, version, enable_type_tree, true)?);
        }
    }

    let user_info = r.read_cstring()?;
    let metadata_end = r.position() as usize;
    if metadata_end as u64 > header.data_offset {
        return Err(Error::InvalidSerializedHeader(format!(
            "metadata ends at {metadata_end}, past the data offset {}",
            header.data_offset
        )));
    }

    tracing::debug!(
        "SerializedFile v{} ({}): {} types, {} objects, {} externals",
        version,
        unity_version,
        types.len(),
        objects.len(),
        externals.len()
    );

    Ok(SerializedFile {
        header_bytes: data[..header_len].to_vec(),
        metadata_prefix: data[header_len..prefix_end].to_vec(),
        metadata_suffix: data[table_end..metadata_end].to_vec(),
        data_gap: data[metadata_end..header.data_offset as usize].to_vec(),
        header,
        unity_version,
        target_platform,
        enable_type_tree,
        types,
        big_id_enabled,
        objects,
        scripts,
        externals,
        ref_types,
        user_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_garbage() {
        let garbage: Vec<u8> = (0..256u32).map(|i| (i * 37 % 251) as u8).collect();
        let err = parse_serialized_bytes(&garbage).unwrap_err();
        assert!(err.is_load_error(), "{err}");
    }

    #[test]
    fn test_rejects_short_input() {
        assert!(matches!(
            parse_serialized_bytes(b"UnityFS"),
            Err(Error::InvalidSerializedHeader(_))
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut header = vec![0u8; 64];
        header[4..8].copy_from_slice(&64u32.to_be_bytes());
        header[8..12].copy_from_slice(&8u32.to_be_bytes());
        assert!(matches!(
            parse_serialized_bytes(&header),
            Err(Error::UnsupportedSerializedVersion(8))
        ));
    }
}
