//! Sequential little-endian writer.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::util::Result;

/// Output stream that tracks how many bytes have been written.
pub struct ByteWriter<W: Write> {
    writer: W,
    pos: u64,
}

impl<W: Write> ByteWriter<W> {
    /// Wrap a writer. Position starts at zero.
    pub fn new(writer: W) -> Self {
        Self { writer, pos: 0 }
    }

    /// Wrap a writer whose output already starts at `pos`.
    pub fn with_position(writer: W, pos: u64) -> Self {
        Self { writer, pos }
    }

    /// Get the current write position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Write bytes and advance position.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.pos += data.len() as u64;
        Ok(())
    }

    /// Write a u8 value.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.pos += 1;
        Ok(())
    }

    /// Write an i32 value (little-endian).
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.writer.write_i32::<LittleEndian>(value)?;
        self.pos += 4;
        Ok(())
    }

    /// Write a u32 value (little-endian).
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(value)?;
        self.pos += 4;
        Ok(())
    }

    /// Write an f32 value (little-endian).
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.writer.write_f32::<LittleEndian>(value)?;
        self.pos += 4;
        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ByteReader;

    #[test]
    fn test_write_tracks_position() {
        let mut w = ByteWriter::new(Vec::new());
        w.write_f32(2.0).unwrap();
        w.write_i32(-1).unwrap();
        w.write_u8(9).unwrap();
        w.write_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(w.pos(), 12);

        let buf = w.into_inner();
        let mut r = ByteReader::new(&buf);
        assert_eq!(r.read_f32().unwrap(), 2.0);
        assert_eq!(r.read_i32().unwrap(), -1);
        assert_eq!(r.read_u8().unwrap(), 9);
        assert_eq!(r.read_bytes(3).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_with_position() {
        let mut w = ByteWriter::with_position(Vec::new(), 100);
        w.write_u32(7).unwrap();
        assert_eq!(w.pos(), 104);
        assert_eq!(w.into_inner().len(), 4);
    }
}
