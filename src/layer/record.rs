//! Per-layer metadata record and payload.
//!
//! ## Record Layout (36 bytes, little-endian)
//!
//! ```text
//! +--------+---------------------+---------+
//! | offset | field               | type    |
//! +--------+---------------------+---------+
//! |   0    | Z position          | f32     |
//! |   4    | exposure time       | f32     |
//! |   8    | off time            | f32     |
//! |  12    | payload offset      | i32     |
//! |  16    | payload length      | i32     |
//! |  20    | reserved x4         | i32 x 4 |
//! +--------+---------------------+---------+
//! ```
//!
//! Payloads live in a separate region of the file. Each one is followed
//! by a single zero pad byte that its declared length does not count.

use std::io::Write;

use crate::raster::{decode_with, encode, DecodeMode, Decoded, OverlayRow, PackedOverlay, Raster};
use crate::stream::{ByteReader, ByteWriter};
use crate::util::{BitRow, Error, Result};

/// Size of one metadata record in bytes.
pub const LAYER_RECORD_SIZE: usize = 36;

/// Byte written after every payload.
pub const PAYLOAD_PAD: u8 = 0;

/// Derived per-layer results, filled in during a sequential load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerAnalysis {
    pub pixels: u64,
    pub island_count: usize,
    pub island_rows: Vec<BitRow>,
    pub overlay: PackedOverlay,
    pub margin_breach: bool,
}

/// One layer: fixed metadata, encoded raster bytes, and analysis results.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerRecord {
    z: f32,
    exposure: f32,
    off_time: f32,
    data_offset: i32,
    data_len: i32,
    reserved: [i32; 4],
    payload: Vec<u8>,
    analysis: Option<LayerAnalysis>,
}

impl LayerRecord {
    /// Create a record for a new layer from an encoded payload.
    pub fn new(z: f32, exposure: f32, off_time: f32, payload: Vec<u8>) -> Result<Self> {
        let data_len = payload_len(&payload)?;
        Ok(Self {
            z,
            exposure,
            off_time,
            data_offset: 0,
            data_len,
            reserved: [0; 4],
            payload,
            analysis: None,
        })
    }

    /// Read the 36-byte metadata block. The payload is attached separately.
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let z = reader.read_f32()?;
        let exposure = reader.read_f32()?;
        let off_time = reader.read_f32()?;
        let data_offset = reader.read_i32()?;
        let data_len = reader.read_i32()?;
        let mut reserved = [0i32; 4];
        for slot in &mut reserved {
            *slot = reader.read_i32()?;
        }
        Ok(Self {
            z,
            exposure,
            off_time,
            data_offset,
            data_len,
            reserved,
            payload: Vec::new(),
            analysis: None,
        })
    }

    /// Copy this layer's payload out of the whole-file buffer.
    pub fn attach_payload(&mut self, source: &[u8]) -> Result<()> {
        if self.data_offset < 0 || self.data_len < 0 {
            return Err(Error::invalid(format!(
                "payload offset {} / length {} must be non-negative",
                self.data_offset, self.data_len
            )));
        }
        let bytes = ByteReader::new(source).slice(self.data_offset as u64, self.data_len as usize)?;
        self.payload = bytes.to_vec();
        Ok(())
    }

    /// Write the metadata block, stamping `next_data_offset` as the payload
    /// offset. Returns where the following payload starts.
    pub fn write<W: Write>(&mut self, writer: &mut ByteWriter<W>, next_data_offset: i32) -> Result<i32> {
        self.data_offset = next_data_offset;

        writer.write_f32(self.z)?;
        writer.write_f32(self.exposure)?;
        writer.write_f32(self.off_time)?;
        writer.write_i32(self.data_offset)?;
        writer.write_i32(self.data_len)?;
        for &value in &self.reserved {
            writer.write_i32(value)?;
        }

        next_data_offset
            .checked_add(self.data_len)
            .and_then(|v| v.checked_add(1))
            .ok_or_else(|| Error::invalid("payload offsets overflow i32"))
    }

    /// Write the payload followed by its pad byte.
    ///
    /// Fails if the held payload does not match the declared length, as
    /// after [`unlink`](Self::unlink) or before [`attach_payload`](Self::attach_payload).
    pub fn write_payload<W: Write>(&self, writer: &mut ByteWriter<W>) -> Result<()> {
        self.check_payload()?;
        writer.write_bytes(&self.payload)?;
        writer.write_u8(PAYLOAD_PAD)
    }

    /// Decode the attached payload.
    pub fn decode(&self, width: usize, height: usize, mode: DecodeMode) -> Result<Decoded> {
        decode_with(&self.payload, width, height, mode)
    }

    /// Replace the payload with an encoding of `raster`.
    pub fn replace_raster(&mut self, raster: &Raster) -> Result<()> {
        let payload = encode(raster);
        self.data_len = payload_len(&payload)?;
        self.payload = payload;
        self.analysis = None;
        Ok(())
    }

    /// Drop the payload, island rows and overlay once every consumer is done
    /// with them. Counts and the margin flag stay.
    pub fn unlink(&mut self) {
        self.payload = Vec::new();
        if let Some(analysis) = &mut self.analysis {
            analysis.island_rows = Vec::new();
            analysis.overlay = PackedOverlay::default();
        }
    }

    fn check_payload(&self) -> Result<()> {
        if i32::try_from(self.payload.len()).ok() != Some(self.data_len) {
            return Err(Error::invalid(format!(
                "payload holds {} bytes, record declares {}",
                self.payload.len(),
                self.data_len
            )));
        }
        Ok(())
    }

    pub(crate) fn set_analysis(&mut self, analysis: LayerAnalysis) {
        self.analysis = Some(analysis);
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.z
    }

    #[inline]
    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    #[inline]
    pub fn off_time(&self) -> f32 {
        self.off_time
    }

    pub fn set_exposure(&mut self, seconds: f32) {
        self.exposure = seconds;
    }

    pub fn set_off_time(&mut self, seconds: f32) {
        self.off_time = seconds;
    }

    #[inline]
    pub fn data_offset(&self) -> i32 {
        self.data_offset
    }

    #[inline]
    pub fn data_len(&self) -> i32 {
        self.data_len
    }

    /// Opaque fields kept for round-trip fidelity.
    #[inline]
    pub fn reserved(&self) -> [i32; 4] {
        self.reserved
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn analysis(&self) -> Option<&LayerAnalysis> {
        self.analysis.as_ref()
    }

    /// Lit pixels in the decoded raster, 0 before analysis.
    pub fn pixels(&self) -> u64 {
        self.analysis.as_ref().map_or(0, |a| a.pixels)
    }

    /// Island components found by classification, 0 before analysis.
    pub fn island_count(&self) -> usize {
        self.analysis.as_ref().map_or(0, |a| a.island_count)
    }

    pub fn island_rows(&self) -> &[BitRow] {
        self.analysis.as_ref().map_or(&[][..], |a| a.island_rows.as_slice())
    }

    pub fn margin_breach(&self) -> bool {
        self.analysis.as_ref().is_some_and(|a| a.margin_breach)
    }

    /// Classified overlay unpacked into rows, empty before analysis.
    pub fn overlay_rows(&self) -> Result<Vec<OverlayRow>> {
        match &self.analysis {
            Some(a) => a.overlay.rows(),
            None => Ok(Vec::new()),
        }
    }
}

fn payload_len(payload: &[u8]) -> Result<i32> {
    i32::try_from(payload.len()).map_err(|_| Error::invalid("payload larger than i32::MAX bytes"))
}

/// Write all metadata records followed by all payloads.
///
/// `payload_start` is the absolute file offset the first payload will land
/// at; offsets are stamped in layer order. Nothing is written if any layer
/// is missing its payload.
pub fn write_layer_table<W: Write>(
    writer: &mut ByteWriter<W>,
    layers: &mut [LayerRecord],
    payload_start: i32,
) -> Result<()> {
    for (index, layer) in layers.iter().enumerate() {
        layer.check_payload().map_err(|e| Error::layer(index, e))?;
    }
    let mut next = payload_start;
    for layer in layers.iter_mut() {
        next = layer.write(writer, next)?;
    }
    for layer in layers.iter() {
        layer.write_payload(writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_bytes() -> Vec<u8> {
        let mut w = ByteWriter::new(Vec::new());
        w.write_f32(0.05).unwrap();
        w.write_f32(8.0).unwrap();
        w.write_f32(1.5).unwrap();
        w.write_i32(40).unwrap();
        w.write_i32(3).unwrap();
        for v in [11, -22, 33, 44] {
            w.write_i32(v).unwrap();
        }
        w.into_inner()
    }

    #[test]
    fn test_read_fields() {
        let bytes = record_bytes();
        assert_eq!(bytes.len(), LAYER_RECORD_SIZE);

        let mut reader = ByteReader::new(&bytes);
        let rec = LayerRecord::read(&mut reader).unwrap();
        assert_eq!(reader.pos(), LAYER_RECORD_SIZE as u64);
        assert_eq!(rec.z(), 0.05);
        assert_eq!(rec.exposure(), 8.0);
        assert_eq!(rec.off_time(), 1.5);
        assert_eq!(rec.data_offset(), 40);
        assert_eq!(rec.data_len(), 3);
        assert_eq!(rec.reserved(), [11, -22, 33, 44]);
        assert!(rec.payload().is_empty());
    }

    #[test]
    fn test_write_reproduces_bytes() {
        let bytes = record_bytes();
        let mut rec = LayerRecord::read(&mut ByteReader::new(&bytes)).unwrap();

        let mut w = ByteWriter::new(Vec::new());
        let next = rec.write(&mut w, 40).unwrap();
        assert_eq!(next, 40 + 3 + 1);
        assert_eq!(w.into_inner(), bytes);
    }

    #[test]
    fn test_write_stamps_offset() {
        let mut rec = LayerRecord::new(0.1, 6.0, 1.0, vec![0x08]).unwrap();
        let mut w = ByteWriter::new(Vec::new());
        assert_eq!(rec.write(&mut w, 500).unwrap(), 502);
        assert_eq!(rec.data_offset(), 500);

        let buf = w.into_inner();
        let back = LayerRecord::read(&mut ByteReader::new(&buf)).unwrap();
        assert_eq!(back.data_offset(), 500);
        assert_eq!(back.data_len(), 1);
    }

    #[test]
    fn test_payload_pad_byte() {
        let rec = LayerRecord::new(0.0, 1.0, 1.0, vec![0x83, 0x05]).unwrap();
        let mut w = ByteWriter::new(Vec::new());
        rec.write_payload(&mut w).unwrap();
        assert_eq!(w.into_inner(), vec![0x83, 0x05, PAYLOAD_PAD]);
    }

    #[test]
    fn test_attach_payload_bounds() {
        let source = [0u8, 0, 0x88, 0x01, 0];
        let mut rec = LayerRecord::new(0.0, 1.0, 1.0, Vec::new()).unwrap();
        rec.data_offset = 2;
        rec.data_len = 2;
        rec.attach_payload(&source).unwrap();
        assert_eq!(rec.payload(), &[0x88, 0x01]);

        rec.data_len = 10;
        assert!(matches!(rec.attach_payload(&source), Err(Error::SourceTruncated { .. })));

        rec.data_offset = -1;
        assert!(matches!(rec.attach_payload(&source), Err(Error::InvalidRecord(_))));
    }

    #[test]
    fn test_setters_and_unlink() {
        let mut rec = LayerRecord::new(0.0, 1.0, 1.0, vec![0x08]).unwrap();
        rec.set_exposure(12.5);
        rec.set_off_time(3.0);
        assert_eq!(rec.exposure(), 12.5);
        assert_eq!(rec.off_time(), 3.0);

        rec.set_analysis(LayerAnalysis {
            pixels: 3,
            island_count: 1,
            island_rows: vec![BitRow::from_columns(4, [0, 1, 2])],
            overlay: PackedOverlay::from_bytes(4, 1, vec![0x83, 0x01]),
            margin_breach: true,
        });
        assert_eq!(rec.overlay_rows().unwrap().len(), 1);

        rec.unlink();
        assert!(rec.payload().is_empty());
        assert!(rec.island_rows().is_empty());
        assert!(rec.overlay_rows().unwrap().is_empty());
        assert_eq!(rec.island_count(), 1);
        assert_eq!(rec.pixels(), 3);
        assert!(rec.margin_breach());
    }

    #[test]
    fn test_replace_raster() {
        let mut rec = LayerRecord::new(0.0, 1.0, 1.0, vec![0x08]).unwrap();
        let mut raster = Raster::new(4, 2);
        raster.set(0, 1).unwrap();
        rec.replace_raster(&raster).unwrap();
        assert_eq!(rec.payload(), &[0x01, 0x81, 0x06]);
        assert_eq!(rec.data_len(), 3);
        assert_eq!(rec.decode(4, 2, DecodeMode::Strict).unwrap().raster, raster);
    }

    #[test]
    fn test_layer_table_layout() {
        let mut layers = vec![
            LayerRecord::new(0.05, 8.0, 1.0, vec![0x08]).unwrap(),
            LayerRecord::new(0.10, 8.0, 1.0, vec![0x84, 0x04]).unwrap(),
        ];
        let payload_start = (2 * LAYER_RECORD_SIZE) as i32;
        let mut w = ByteWriter::new(Vec::new());
        write_layer_table(&mut w, &mut layers, payload_start).unwrap();
        let buf = w.into_inner();

        assert_eq!(buf.len(), 2 * LAYER_RECORD_SIZE + 2 + 3);
        assert_eq!(layers[0].data_offset(), 72);
        assert_eq!(layers[1].data_offset(), 74);
        assert_eq!(&buf[72..], &[0x08, 0, 0x84, 0x04, 0]);
    }

    #[test]
    fn test_unlinked_record_refuses_to_save() {
        let mut layers = vec![
            LayerRecord::new(0.05, 8.0, 1.0, vec![0x84, 0x04]).unwrap(),
            LayerRecord::new(0.10, 8.0, 1.0, vec![0x08]).unwrap(),
        ];
        layers[0].unlink();
        assert_eq!(layers[0].data_len(), 2);

        let mut w = ByteWriter::new(Vec::new());
        let err = layers[0].write_payload(&mut w).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));

        let mut w = ByteWriter::new(Vec::new());
        let err = write_layer_table(&mut w, &mut layers, 72).unwrap_err();
        assert_eq!(err.layer_index(), Some(0));
        assert!(w.into_inner().is_empty());
    }

    #[test]
    fn test_unattached_record_refuses_to_save() {
        let bytes = record_bytes();
        let rec = LayerRecord::read(&mut ByteReader::new(&bytes)).unwrap();
        let mut w = ByteWriter::new(Vec::new());
        assert!(matches!(rec.write_payload(&mut w), Err(Error::InvalidRecord(_))));
    }
}
