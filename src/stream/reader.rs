//! Sequential little-endian reader over an in-memory slice file.

use byteorder::{ByteOrder, LittleEndian};

use crate::util::{Error, Result};

/// Cursor over a fully loaded source buffer.
///
/// Every read is bounds-checked and fails with [`Error::SourceTruncated`]
/// instead of panicking.
#[derive(Clone, Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a reader positioned at `offset`.
    pub fn at(data: &'a [u8], offset: u64) -> Result<Self> {
        if offset > data.len() as u64 {
            return Err(Error::SourceTruncated {
                offset,
                len: 0,
                available: data.len() as u64,
            });
        }
        Ok(Self { data, pos: offset as usize })
    }

    /// Get the current read position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos as u64
    }

    /// Bytes left after the cursor.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Get the whole underlying buffer.
    #[inline]
    pub fn source(&self) -> &'a [u8] {
        self.data
    }

    /// Read `len` bytes and advance.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self.slice(self.pos as u64, len)?;
        self.pos += len;
        Ok(bytes)
    }

    /// Borrow `len` bytes at an absolute position without moving the cursor.
    pub fn slice(&self, offset: u64, len: usize) -> Result<&'a [u8]> {
        let end = offset.checked_add(len as u64);
        match end {
            Some(end) if end <= self.data.len() as u64 => {
                Ok(&self.data[offset as usize..end as usize])
            }
            _ => Err(Error::SourceTruncated {
                offset,
                len: len as u64,
                available: self.data.len() as u64,
            }),
        }
    }

    /// Read a u8 value.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Read an i32 value (little-endian).
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.read_bytes(4)?))
    }

    /// Read a u32 value (little-endian).
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    /// Read an f32 value (little-endian).
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }
}
