//! Object payload decoding and encoding driven by a type tree
//!
//! Decoding produces a [`FieldValue`] tree; encoding is its exact inverse,
//! so re-encoding an unmodified value reproduces the original bytes.

use indexmap::IndexMap;

use super::TypeTree;
use crate::error::{Error, Result};
use crate::formats::binary::{EndianReader, EndianWriter};
use crate::formats::value::FieldValue;

/// Integer node types and their (width, signed) encoding
fn int_layout(type_name: &str) -> Option<(u8, bool)> {
    Some(match type_name {
        "SInt8" => (1, true),
        "UInt8" | "char" => (1, false),
        "SInt16" | "short" => (2, true),
        "UInt16" | "unsigned short" => (2, false),
        "SInt32" | "int" => (4, true),
        "UInt32" | "unsigned int" | "Type*" => (4, false),
        "SInt64" | "long long" => (8, true),
        "UInt64" | "unsigned long long" | "FileSize" => (8, false),
        _ => return None,
    })
}

/// Decode a whole object; trailing bytes are tolerated but logged
///
/// # Errors
/// Returns [`Error::UnexpectedEof`] when the data is shorter than the tree
/// requires, or [`Error::InvalidTypeTree`] for malformed arrays.
pub fn decode_object(tree: &TypeTree, data: &[u8], big_endian: bool) -> Result<FieldValue> {
    let (value, consumed) = decode_prefix(tree, data, big_endian)?;
    if consumed != data.len() {
        tracing::debug!(
            "Type tree '{}' consumed {} of {} bytes",
            tree.root().map_or("", |r| r.type_name.as_str()),
            consumed,
            data.len()
        );
    }
    Ok(value)
}

/// Decode the leading part of `data` described by `tree`
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
/// See [`decode_object`].
pub fn decode_prefix(tree: &TypeTree, data: &[u8], big_endian: bool) -> Result<(FieldValue, usize)> {
    if tree.nodes.is_empty() {
        return Err(Error::InvalidTypeTree("empty type tree".to_string()));
    }
    let mut decoder = Decoder {
        tree,
        reader: EndianReader::new(data, big_endian),
    };
    let value = decoder.read_node(0)?;
    Ok((value, decoder.reader.position() as usize))
}

/// Encode `value` against `tree`
///
/// # Errors
/// Returns [`Error::TypeMismatch`] when a value variant does not fit its
/// node, or [`Error::InvalidTypeTree`] when a required field is missing.
pub fn encode_object(tree: &TypeTree, value: &FieldValue, big_endian: bool) -> Result<Vec<u8>> {
    if tree.nodes.is_empty() {
        return Err(Error::InvalidTypeTree("empty type tree".to_string()));
    }
    let mut encoder = Encoder {
        tree,
        writer: EndianWriter::new(big_endian),
    };
    encoder.write_node(0, value)?;
    Ok(encoder.writer.into_inner())
}

struct Decoder<'t, 'd> {
    tree: &'t TypeTree,
    reader: EndianReader<'d>,
}

impl Decoder<'_, '_> {
    fn read_len(&mut self) -> Result<usize> {
        let offset = self.reader.position();
        let len = self.reader.read_i32()?;
        if len < 0 || len as usize > self.reader.remaining() {
            return Err(Error::InvalidTypeTree(format!("length {len} at offset {offset} is out of range")));
        }
        Ok(len as usize)
    }

    fn read_int(&mut self, width: u8, signed: bool) -> Result<i64> {
        Ok(match (width, signed) {
            (1, true) => i64::from(self.reader.read_i8()?),
            (1, false) => i64::from(self.reader.read_u8()?),
            (2, true) => i64::from(self.reader.read_i16()?),
            (2, false) => i64::from(self.reader.read_u16()?),
            (4, true) => i64::from(self.reader.read_i32()?),
            (4, false) => i64::from(self.reader.read_u32()?),
            (_, true) => self.reader.read_i64()?,
            // Unsigned 64-bit values keep their bit pattern
            (_, false) => self.reader.read_u64()? as i64,
        })
    }

    fn read_node(&mut self, index: usize) -> Result<FieldValue> {
        let tree = self.tree;
        let node = &tree.nodes[index];
        let children = tree.children(index);
        let mut align = node.is_aligned();

        let value = if let Some((width, signed)) = int_layout(&node.type_name) {
            FieldValue::Int(self.read_int(width, signed)?)
        } else {
            match node.type_name.as_str() {
                "float" => FieldValue::Float(f64::from(self.reader.read_f32()?)),
                "double" => FieldValue::Float(self.reader.read_f64()?),
                "bool" => FieldValue::Bool(self.reader.read_bool()?),
                "string" => {
                    align |= children.first().is_some_and(|&c| tree.nodes[c].is_aligned());
                    let len = self.read_len()?;
                    let bytes = self.reader.read_bytes(len)?;
                    match String::from_utf8(bytes) {
                        Ok(s) => FieldValue::String(s),
                        Err(e) => FieldValue::Bytes(e.into_bytes()),
                    }
                }
                "TypelessData" => {
                    let len = self.read_len()?;
                    FieldValue::Bytes(self.reader.read_bytes(len)?)
                }
                "Array" => self.read_array(index)?,
                _ if children.first().is_some_and(|&c| tree.nodes[c].type_name == "Array") => {
                    let array = children[0];
                    if tree.nodes[array].is_aligned() {
                        align = true;
                    }
                    self.read_array(array)?
                }
                _ if children.is_empty() && node.byte_size > 0 => {
                    // Unknown fixed-size leaf: keep its bytes opaque
                    FieldValue::Bytes(self.reader.read_bytes(node.byte_size as usize)?)
                }
                _ => {
                    let mut map = IndexMap::with_capacity(children.len());
                    for child in children {
                        let value = self.read_node(child)?;
                        map.insert(tree.nodes[child].name.clone(), value);
                    }
                    FieldValue::Map(map)
                }
            }
        };

        if align {
            self.reader.align(4)?;
        }
        Ok(value)
    }

    fn read_array(&mut self, array: usize) -> Result<FieldValue> {
        let tree = self.tree;
        let parts = tree.children(array);
        let [_, template] = parts[..] else {
            return Err(Error::InvalidTypeTree(format!(
                "array node '{}' has {} children, expected size and data",
                tree.nodes[array].name,
                parts.len()
            )));
        };
        let element = &tree.nodes[template];
        let count = self.reader.read_i32()?;
        if count < 0 || (count as usize > self.reader.remaining() && element.byte_size != 0) {
            return Err(Error::InvalidTypeTree(format!(
                "array '{}' declares {count} elements",
                tree.nodes[array].name
            )));
        }
        let count = count as usize;

        if matches!(element.type_name.as_str(), "UInt8" | "char") && tree.children(template).is_empty() {
            let bytes = self.reader.read_bytes(count)?;
            if element.is_aligned() {
                self.reader.align(4)?;
            }
            return Ok(FieldValue::Bytes(bytes));
        }

        let mut items = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            items.push(self.read_node(template)?);
        }
        Ok(FieldValue::List(items))
    }
}

struct Encoder<'t> {
    tree: &'t TypeTree,
    writer: EndianWriter,
}

impl Encoder<'_> {
    fn mismatch(&self, index: usize, value: &FieldValue) -> Error {
        let node = &self.tree.nodes[index];
        Error::TypeMismatch {
            expected: format!("{} '{}'", node.type_name, node.name),
            found: value.kind().to_string(),
        }
    }

    fn write_sized(&mut self, bytes: &[u8]) {
        self.writer.write_i32(bytes.len() as i32);
        self.writer.write_bytes(bytes);
    }

    fn write_int(&mut self, index: usize, width: u8, signed: bool, v: i64) -> Result<()> {
        let tree = self.tree;
        let out_of_range = || {
            let node = &tree.nodes[index];
            Error::TypeMismatch {
                expected: format!("{} '{}'", node.type_name, node.name),
                found: format!("out-of-range integer {v}"),
            }
        };
        match (width, signed) {
            (1, true) => self.writer.write_u8(i8::try_from(v).map_err(|_| out_of_range())? as u8),
            (1, false) => self.writer.write_u8(u8::try_from(v).map_err(|_| out_of_range())?),
            (2, true) => self.writer.write_i16(i16::try_from(v).map_err(|_| out_of_range())?),
            (2, false) => self.writer.write_u16(u16::try_from(v).map_err(|_| out_of_range())?),
            (4, true) => self.writer.write_i32(i32::try_from(v).map_err(|_| out_of_range())?),
            (4, false) => self.writer.write_u32(u32::try_from(v).map_err(|_| out_of_range())?),
            (_, true) => self.writer.write_i64(v),
            (_, false) => self.writer.write_u64(v as u64),
        }
        Ok(())
    }

    fn write_node(&mut self, index: usize, value: &FieldValue) -> Result<()> {
        let tree = self.tree;
        let node = &tree.nodes[index];
        let children = tree.children(index);
        let mut align = node.is_aligned();

        if let Some((width, signed)) = int_layout(&node.type_name) {
            let FieldValue::Int(v) = value else {
                return Err(self.mismatch(index, value));
            };
            self.write_int(index, width, signed, *v)?;
        } else {
            match (node.type_name.as_str(), value) {
                ("float", FieldValue::Float(f)) => self.writer.write_f32(*f as f32),
                ("double", FieldValue::Float(f)) => self.writer.write_f64(*f),
                ("bool", FieldValue::Bool(b)) => self.writer.write_bool(*b),
                ("string", FieldValue::String(s)) => {
                    align |= children.first().is_some_and(|&c| tree.nodes[c].is_aligned());
                    self.write_sized(s.as_bytes());
                }
                ("string", FieldValue::Bytes(b)) => {
                    align |= children.first().is_some_and(|&c| tree.nodes[c].is_aligned());
                    self.write_sized(b);
                }
                ("TypelessData", FieldValue::Bytes(b)) => self.write_sized(b),
                ("float" | "double" | "bool" | "string" | "TypelessData", _) => {
                    return Err(self.mismatch(index, value));
                }
                ("Array", _) => self.write_array(index, value)?,
                _ if children.first().is_some_and(|&c| tree.nodes[c].type_name == "Array") => {
                    let array = children[0];
                    if tree.nodes[array].is_aligned() {
                        align = true;
                    }
                    self.write_array(array, value)?;
                }
                _ if children.is_empty() && node.byte_size > 0 => {
                    let FieldValue::Bytes(b) = value else {
                        return Err(self.mismatch(index, value));
                    };
                    if b.len() != node.byte_size as usize {
                        return Err(self.mismatch(index, value));
                    }
                    self.writer.write_bytes(b);
                }
                _ => {
                    let FieldValue::Map(map) = value else {
                        return Err(self.mismatch(index, value));
                    };
                    for child in children {
                        let name = &tree.nodes[child].name;
                        let field = map.get(name).ok_or_else(|| {
                            Error::InvalidTypeTree(format!("value for '{}' lacks field '{name}'", node.name))
                        })?;
                        self.write_node(child, field)?;
                    }
                }
            }
        }

        if align {
            self.writer.align(4);
        }
        Ok(())
    }

    fn write_array(&mut self, array: usize, value: &FieldValue) -> Result<()> {
        let tree = self.tree;
        let parts = tree.children(array);
        let [_, template] = parts[..] else {
            return Err(Error::InvalidTypeTree(format!(
                "array node '{}' has {} children, expected size and data",
                tree.nodes[array].name,
                parts.len()
            )));
        };
        let element = &tree.nodes[template];
        match value {
            FieldValue::Bytes(bytes)
                if matches!(element.type_name.as_str(), "UInt8" | "char") && tree.children(template).is_empty() =>
            {
                self.writer.write_i32(bytes.len() as i32);
                self.writer.write_bytes(bytes);
                if element.is_aligned() {
                    self.writer.align(4);
                }
            }
            FieldValue::List(items) => {
                self.writer.write_i32(items.len() as i32);
                for item in items {
                    self.write_node(template, item)?;
                }
            }
            other => return Err(self.mismatch(array, other)),
        }
        Ok(())
    }
}
