//! SerializedFile writing
//!
//! Metadata outside the object table is re-emitted verbatim, so the
//! metadata size never changes; objects are laid out in table order at
//! 8-byte alignment from the data offset.

use std::fs;
use std::path::Path;

use super::document::{ObjectEntry, SerializedFile};
use crate::error::{Error, Result};
use crate::formats::binary::{align_up, EndianWriter};

/// Object data alignment relative to the data offset
pub const OBJECT_ALIGNMENT: u64 = 8;

/// Relative start offsets for objects laid out in order
pub(super) fn layout_objects(objects: &[ObjectEntry]) -> Vec<u64> {
    let mut cursor = 0u64;
    objects
        .iter()
        .map(|o| {
            let start = align_up(cursor, OBJECT_ALIGNMENT);
            cursor = start + u64::from(o.byte_size());
            start
        })
        .collect()
}

/// Write the object count and table; `w` must be positioned relative to
/// the start of the file so path id alignment is correct
pub(super) fn write_object_table(
    w: &mut EndianWriter,
    version: u32,
    big_id_enabled: bool,
    objects: &[ObjectEntry],
    starts: &[u64],
) {
    w.write_i32(objects.len() as i32);
    for (object, &start) in objects.iter().zip(starts) {
        if big_id_enabled {
            w.write_i64(object.path_id);
        } else if version < 14 {
            w.write_i32(object.path_id as i32);
        } else {
            w.align(4);
            w.write_i64(object.path_id);
        }
        if version >= 22 {
            w.write_u64(start);
        } else {
            w.write_u32(start as u32);
        }
        w.write_u32(object.byte_size());
        w.write_i32(object.type_id);
        if version < 16 {
            w.write_u16(object.class_id as u16);
        }
        if version < 11 {
            w.write_u16(object.is_destroyed);
        }
        if (11..17).contains(&version) {
            w.write_i16(object.script_type_index);
        }
        if version == 15 || version == 16 {
            w.write_u8(object.stripped);
        }
    }
}

/// Append object data after the metadata, padding to each start
pub(super) fn write_object_data(out: &mut Vec<u8>, data_offset: u64, objects: &[ObjectEntry], starts: &[u64]) {
    for (object, &start) in objects.iter().zip(starts) {
        let absolute = (data_offset + start) as usize;
        out.resize(absolute, 0);
        out.extend_from_slice(&object.data);
    }
}

/// Patch the file size into a big-endian header
pub(super) fn patch_file_size(out: &mut [u8], version: u32) {
    let size = out.len() as u64;
    if version >= 22 {
        out[24..32].copy_from_slice(&size.to_be_bytes());
    } else {
        out[4..8].copy_from_slice(&(size as u32).to_be_bytes());
    }
}

/// Serialize a parsed file back to bytes
///
/// # Errors
/// Returns [`Error::InvalidSerializedHeader`] if the re-emitted metadata
/// no longer ends at the original data offset.
pub fn serialize_serialized(file: &SerializedFile) -> Result<Vec<u8>> {
    let version = file.header.version;
    let starts = layout_objects(&file.objects);

    let mut w = EndianWriter::new(file.header.big_endian);
    w.write_bytes(&file.header_bytes);
    w.write_bytes(&file.metadata_prefix);
    write_object_table(&mut w, version, file.big_id_enabled, &file.objects, &starts);
    w.write_bytes(&file.metadata_suffix);
    w.write_bytes(&file.data_gap);

    if w.len() as u64 != file.header.data_offset {
        return Err(Error::InvalidSerializedHeader(format!(
            "metadata re-emitted as {} bytes, expected data offset {}",
            w.len(),
            file.header.data_offset
        )));
    }

    let mut out = w.into_inner();
    write_object_data(&mut out, file.header.data_offset, &file.objects, &starts);
    patch_file_size(&mut out, version);
    Ok(out)
}

/// Serialize and write a file to disk
///
/// # Errors
/// Returns an error if serialization or the write fails.
pub fn write_serialized<P: AsRef<Path>>(file: &SerializedFile, path: P) -> Result<()> {
    let bytes = serialize_serialized(file)?;
    fs::write(path, bytes)?;
    Ok(())
}
