//! Endian-switchable cursor helpers shared by the Unity format readers
//!
//! SerializedFile headers are always big-endian while the metadata and
//! object data follow an endianness flag, so every reader carries one.

use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Cursor over a byte slice with a runtime byte order
pub struct EndianReader<'a> {
    cursor: Cursor<&'a [u8]>,
    pub big_endian: bool,
}

macro_rules! read_prim {
    ($name:ident, $ty:ty, $method:ident) => {
        pub fn $name(&mut self) -> Result<$ty> {
            let value = if self.big_endian {
                self.cursor.$method::<BigEndian>()
            } else {
                self.cursor.$method::<LittleEndian>()
            };
            value.map_err(|_| self.eof())
        }
    };
}

impl<'a> EndianReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8], big_endian: bool) -> Self {
        Self {
            cursor: Cursor::new(data),
            big_endian,
        }
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn set_position(&mut self, pos: u64) {
        self.cursor.set_position(pos);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position() as usize)
    }

    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        *self.cursor.get_ref()
    }

    fn eof(&self) -> Error {
        Error::UnexpectedEof {
            offset: self.cursor.position(),
        }
    }

    pub fn skip(&mut self, count: u64) -> Result<()> {
        let target = self.position() + count;
        if target > self.len() as u64 {
            return Err(self.eof());
        }
        self.cursor.seek(SeekFrom::Start(target))?;
        Ok(())
    }

    /// Skip to the next multiple of `alignment` (relative to the start)
    pub fn align(&mut self, alignment: u64) -> Result<()> {
        let pos = self.position();
        let rem = pos % alignment;
        if rem != 0 {
            self.skip(alignment - rem)?;
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(|_| self.eof())
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.cursor.read_i8().map_err(|_| self.eof())
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_prim!(read_u16, u16, read_u16);
    read_prim!(read_i16, i16, read_i16);
    read_prim!(read_u32, u32, read_u32);
    read_prim!(read_i32, i32, read_i32);
    read_prim!(read_u64, u64, read_u64);
    read_prim!(read_i64, i64, read_i64);
    read_prim!(read_f32, f32, read_f32);
    read_prim!(read_f64, f64, read_f64);

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        if count > self.remaining() {
            return Err(self.eof());
        }
        let mut buf = vec![0u8; count];
        self.cursor.read_exact(&mut buf).map_err(|_| self.eof())?;
        Ok(buf)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.cursor.read_exact(&mut buf).map_err(|_| self.eof())?;
        Ok(buf)
    }

    /// Read a NUL-terminated string
    pub fn read_cstring(&mut self) -> Result<String> {
        let data = self.data();
        let start = self.position() as usize;
        let end = data
            .get(start..)
            .and_then(|rest| rest.iter().position(|&b| b == 0))
            .ok_or_else(|| self.eof())?;
        let text = String::from_utf8_lossy(&data[start..start + end]).into_owned();
        self.set_position((start + end + 1) as u64);
        Ok(text)
    }
}

/// Growable buffer with a runtime byte order
pub struct EndianWriter {
    buf: Vec<u8>,
    pub big_endian: bool,
}

macro_rules! write_prim {
    ($name:ident, $ty:ty, $method:ident) => {
        pub fn $name(&mut self, value: $ty) {
            // Writing into a Vec cannot fail
            let _ = if self.big_endian {
                self.buf.$method::<BigEndian>(value)
            } else {
                self.buf.$method::<LittleEndian>(value)
            };
        }
    };
}

impl EndianWriter {
    #[must_use]
    pub fn new(big_endian: bool) -> Self {
        Self {
            buf: Vec::new(),
            big_endian,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    write_prim!(write_u16, u16, write_u16);
    write_prim!(write_i16, i16, write_i16);
    write_prim!(write_u32, u32, write_u32);
    write_prim!(write_i32, i32, write_i32);
    write_prim!(write_u64, u64, write_u64);
    write_prim!(write_i64, i64, write_i64);
    write_prim!(write_f32, f32, write_f32);
    write_prim!(write_f64, f64, write_f64);

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_cstring(&mut self, text: &str) {
        self.buf.extend_from_slice(text.as_bytes());
        self.buf.push(0);
    }

    /// Zero-pad to the next multiple of `alignment`
    pub fn align(&mut self, alignment: usize) {
        let rem = self.buf.len() % alignment;
        if rem != 0 {
            self.buf.resize(self.buf.len() + alignment - rem, 0);
        }
    }
}

/// Round `value` up to a multiple of `alignment`
#[must_use]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}
