//! Sequential layer loading.
//!
//! Layers are decoded strictly in order: classifying layer `i` needs the
//! raster of layer `i - 1`. The loader keeps that one raster alive between
//! steps and drops it as soon as the next raster supersedes it, so at
//! most two decoded rasters exist at any time.

use serde::{Deserialize, Serialize};

use super::{check_margin, ClassificationEngine, LayerAnalysis, LayerRecord, LoadOptions, LAYER_RECORD_SIZE};
use crate::raster::{Decoded, Raster};
use crate::stream::ByteReader;
use crate::util::{Error, Result};

/// Largest raster area, in pixels, a header may declare. Covers 16K-class
/// panels with room to spare; a larger area is treated as a corrupt header.
pub const MAX_RASTER_PIXELS: u64 = 1 << 28;

/// Header fields the loader needs. Parsing them from the container is up to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceHeader {
    pub width: u32,
    pub height: u32,
    pub layer_count: u32,
    /// Absolute offset of the first layer's metadata record.
    pub layer_table_offset: u64,
}

impl SliceHeader {
    pub fn new(width: u32, height: u32, layer_count: u32, layer_table_offset: u64) -> Self {
        Self { width, height, layer_count, layer_table_offset }
    }

    /// Check the header against a source buffer of `source_len` bytes.
    pub fn validate(&self, source_len: usize) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidHeader(format!(
                "raster must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        let area = u64::from(self.width) * u64::from(self.height);
        if area > MAX_RASTER_PIXELS {
            return Err(Error::InvalidHeader(format!(
                "raster {}x{} exceeds {} pixels",
                self.width, self.height, MAX_RASTER_PIXELS
            )));
        }
        let table_len = self.layer_count as u64 * LAYER_RECORD_SIZE as u64;
        match self.layer_table_offset.checked_add(table_len) {
            Some(end) if end <= source_len as u64 => Ok(()),
            _ => Err(Error::SourceTruncated {
                offset: self.layer_table_offset,
                len: table_len,
                available: source_len as u64,
            }),
        }
    }
}

/// Receives progress while layers load.
///
/// Errors are logged and otherwise ignored; a failing sink never stops a load.
pub trait ProgressSink {
    fn report(&mut self, current: usize, total: usize, status: &str) -> Result<()>;
}

impl<F> ProgressSink for F
where
    F: FnMut(usize, usize, &str) -> Result<()>,
{
    fn report(&mut self, current: usize, total: usize, status: &str) -> Result<()> {
        self(current, total, status)
    }
}

/// Discards progress.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _current: usize, _total: usize, _status: &str) -> Result<()> {
        Ok(())
    }
}

/// Emits progress as `tracing` debug events.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&mut self, current: usize, total: usize, status: &str) -> Result<()> {
        tracing::debug!(current, total, "{status}");
        Ok(())
    }
}

/// Step-wise loader over the layer table of one source buffer.
pub struct LayerSequenceLoader<'a> {
    source: &'a [u8],
    header: SliceHeader,
    options: LoadOptions,
    reader: ByteReader<'a>,
    engine: ClassificationEngine,
    previous: Option<Raster>,
    next_index: usize,
}

impl<'a> LayerSequenceLoader<'a> {
    pub fn new(source: &'a [u8], header: SliceHeader, options: LoadOptions) -> Result<Self> {
        header.validate(source.len())?;
        let reader = ByteReader::at(source, header.layer_table_offset)?;
        let engine = ClassificationEngine::new(
            header.width as usize,
            header.height as usize,
            options.islands.clone(),
        );
        Ok(Self {
            source,
            header,
            options,
            reader,
            engine,
            previous: None,
            next_index: 0,
        })
    }

    #[inline]
    pub fn header(&self) -> &SliceHeader {
        &self.header
    }

    #[inline]
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Index of the layer the next call will load.
    #[inline]
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.next_index >= self.header.layer_count as usize
    }

    /// Raster of the most recently loaded layer, kept for the next classification.
    #[inline]
    pub fn previous(&self) -> Option<&Raster> {
        self.previous.as_ref()
    }

    /// Load the next layer, or `None` once every layer has been read.
    ///
    /// A failure is wrapped in [`Error::Layer`] and ends the sequence:
    /// every later layer depends on the one that failed.
    pub fn next_layer(&mut self, progress: &mut dyn ProgressSink) -> Result<Option<LayerRecord>> {
        if self.is_finished() {
            self.previous = None;
            return Ok(None);
        }

        let index = self.next_index;
        let total = self.header.layer_count as usize;
        let record = match self.load_layer(index) {
            Ok(record) => record,
            Err(err) => {
                self.next_index = total;
                self.previous = None;
                return Err(Error::layer(index, err));
            }
        };

        self.next_index += 1;
        if self.is_finished() {
            self.previous = None;
        }

        if let Err(err) = progress.report(index, total, &format!("Loaded layer {index}/{total}")) {
            tracing::warn!(index, %err, "progress sink failed");
        }
        Ok(Some(record))
    }

    fn load_layer(&mut self, index: usize) -> Result<LayerRecord> {
        let (width, height) = (self.header.width as usize, self.header.height as usize);

        let mut record = LayerRecord::read(&mut self.reader)?;
        record.attach_payload(self.source)?;

        let Decoded { raster, pixels } = record.decode(width, height, self.options.decode)?;
        let margin_breach = self.options.margin > 0 && check_margin(&raster, self.options.margin);
        let classification = self.engine.classify(&raster, self.previous.as_ref())?;

        tracing::debug!(
            index,
            z = record.z(),
            pixels,
            islands = classification.island_count,
            margin_breach,
            "layer classified"
        );

        record.set_analysis(LayerAnalysis {
            pixels,
            island_count: classification.island_count,
            island_rows: classification.island_rows,
            overlay: classification.overlay,
            margin_breach,
        });

        // Supersedes and drops the previous layer's raster
        self.previous = Some(raster);
        Ok(record)
    }
}

/// Load and analyse every layer in order.
#[tracing::instrument(skip_all, fields(layers = header.layer_count, width = header.width, height = header.height))]
pub fn load_all(
    source: &[u8],
    header: SliceHeader,
    options: &LoadOptions,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<LayerRecord>> {
    let mut loader = LayerSequenceLoader::new(source, header, options.clone())?;
    let mut layers = Vec::with_capacity(header.layer_count as usize);
    while let Some(layer) = loader.next_layer(progress)? {
        layers.push(layer);
    }
    tracing::debug!(loaded = layers.len(), "layer sequence complete");
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::write_layer_table;
    use crate::raster::{encode, PixelClass};
    use crate::stream::ByteWriter;

    const TABLE_OFFSET: u64 = 16;

    /// Source buffer: 16 junk header bytes, the layer table, then payloads.
    fn build_source(width: usize, height: usize, layers: &[Raster]) -> (Vec<u8>, SliceHeader) {
        let mut records: Vec<LayerRecord> = layers
            .iter()
            .enumerate()
            .map(|(i, r)| LayerRecord::new(0.05 * (i + 1) as f32, 8.0, 1.0, encode(r)).unwrap())
            .collect();
        let payload_start = TABLE_OFFSET as usize + records.len() * LAYER_RECORD_SIZE;

        let mut w = ByteWriter::with_position(vec![0xEE; TABLE_OFFSET as usize], TABLE_OFFSET);
        write_layer_table(&mut w, &mut records, payload_start as i32).unwrap();
        let header = SliceHeader::new(width as u32, height as u32, layers.len() as u32, TABLE_OFFSET);
        (w.into_inner(), header)
    }

    fn raster(width: usize, height: usize, lit: &[(usize, usize)]) -> Raster {
        let mut r = Raster::new(width, height);
        for &(y, x) in lit {
            r.set(y, x).unwrap();
        }
        r
    }

    #[test]
    fn test_load_all_classifies_each_layer() {
        let full = raster(4, 2, &[(0, 0), (0, 1), (0, 2), (0, 3), (1, 0), (1, 1), (1, 2), (1, 3)]);
        let blank = Raster::new(4, 2);
        let lone = raster(4, 2, &[(1, 2)]);
        let (source, header) = build_source(4, 2, &[full, blank, lone]);

        let opts = LoadOptions::new().with_island_policy(crate::layer::IslandPolicy::keep_all());
        let layers = load_all(&source, header, &opts, &mut NoProgress).unwrap();
        assert_eq!(layers.len(), 3);

        assert_eq!(layers[0].pixels(), 8);
        assert_eq!(layers[0].island_count(), 0);
        let rows = layers[0].overlay_rows().unwrap();
        assert!(rows.iter().all(|r| r.segments.iter().all(|s| s.class == PixelClass::Supported)));

        assert_eq!(layers[1].pixels(), 0);
        assert_eq!(layers[2].island_count(), 1);
        assert_eq!(layers[2].island_rows()[1].iter_ones().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_previous_raster_is_latest_only() {
        let layers: Vec<Raster> = (0..4).map(|i| raster(5, 3, &[(i % 3, i)])).collect();
        let (source, header) = build_source(5, 3, &layers);
        let mut loader = LayerSequenceLoader::new(&source, header, LoadOptions::default()).unwrap();

        for (i, expected) in layers.iter().enumerate() {
            let record = loader.next_layer(&mut NoProgress).unwrap().unwrap();
            assert_eq!(record.z(), 0.05 * (i + 1) as f32);
            if i + 1 < layers.len() {
                assert_eq!(loader.previous(), Some(expected));
            }
        }
        assert!(loader.is_finished());
        assert!(loader.previous().is_none());
        assert!(loader.next_layer(&mut NoProgress).unwrap().is_none());
    }

    #[test]
    fn test_margin_only_when_enabled() {
        let edge = raster(6, 6, &[(0, 3)]);
        let (source, header) = build_source(6, 6, &[edge]);

        let off = load_all(&source, header, &LoadOptions::default(), &mut NoProgress).unwrap();
        assert!(!off[0].margin_breach());

        let on = load_all(&source, header, &LoadOptions::new().with_margin(1), &mut NoProgress).unwrap();
        assert!(on[0].margin_breach());
    }

    #[test]
    fn test_progress_reports_and_failures_ignored() {
        let layers = vec![Raster::new(3, 3), Raster::new(3, 3), Raster::new(3, 3)];
        let (source, header) = build_source(3, 3, &layers);

        let mut seen = Vec::new();
        let mut sink = |current: usize, total: usize, _status: &str| -> Result<()> {
            seen.push((current, total));
            Err(Error::other("sink closed"))
        };
        let loaded = load_all(&source, header, &LoadOptions::default(), &mut sink).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(seen, vec![(0, 3), (1, 3), (2, 3)]);
    }

    #[test]
    fn test_truncated_payload_reports_layer() {
        let layers = vec![Raster::new(4, 2), Raster::new(4, 2)];
        let (mut source, header) = build_source(4, 2, &layers);
        // Drop the second payload and its pad byte
        source.truncate(source.len() - 2);

        let mut loader = LayerSequenceLoader::new(&source, header, LoadOptions::default()).unwrap();
        assert!(loader.next_layer(&mut NoProgress).unwrap().is_some());
        let err = loader.next_layer(&mut NoProgress).unwrap_err();
        assert_eq!(err.layer_index(), Some(1));
        assert!(matches!(err, Error::Layer { ref source, .. } if matches!(**source, Error::SourceTruncated { .. })));
        assert!(loader.is_finished());
        assert!(loader.previous().is_none());
    }

    #[test]
    fn test_header_validation() {
        let (source, header) = build_source(4, 2, &[Raster::new(4, 2)]);
        let bad = SliceHeader { width: 0, ..header };
        assert!(matches!(
            LayerSequenceLoader::new(&source, bad, LoadOptions::default()),
            Err(Error::InvalidHeader(_))
        ));

        let too_many = SliceHeader { layer_count: 50, ..header };
        assert!(matches!(
            load_all(&source, too_many, &LoadOptions::default(), &mut NoProgress),
            Err(Error::SourceTruncated { .. })
        ));
    }

    #[test]
    fn test_oversized_raster_rejected_before_allocation() {
        let (source, _) = build_source(4, 2, &[Raster::new(4, 2)]);
        let huge = SliceHeader::new(u32::MAX, u32::MAX, 1, TABLE_OFFSET);
        assert!(matches!(
            LayerSequenceLoader::new(&source, huge, LoadOptions::default()),
            Err(Error::InvalidHeader(_))
        ));

        let wide = SliceHeader::new(1 << 20, 1 << 9, 1, TABLE_OFFSET);
        assert!(matches!(wide.validate(source.len()), Err(Error::InvalidHeader(_))));
        let at_limit = SliceHeader::new(1 << 19, 1 << 9, 1, TABLE_OFFSET);
        assert!(at_limit.validate(source.len()).is_ok());
    }

    #[test]
    fn test_strict_mode_rejects_short_payload() {
        let (mut source, header) = build_source(4, 2, &[Raster::new(4, 2)]);
        // Shrink the single background run from 8 to 7 pixels
        let payload_at = TABLE_OFFSET as usize + LAYER_RECORD_SIZE;
        source[payload_at] = 0x07;

        let lenient = load_all(&source, header, &LoadOptions::default(), &mut NoProgress).unwrap();
        assert_eq!(lenient[0].pixels(), 0);

        let strict = LoadOptions::new().with_decode_mode(crate::raster::DecodeMode::Strict);
        let err = load_all(&source, header, &strict, &mut NoProgress).unwrap_err();
        assert_eq!(err.layer_index(), Some(0));
    }

    #[test]
    fn test_strict_mode_overflow_surfaces_range() {
        let (mut source, header) = build_source(4, 2, &[Raster::new(4, 2)]);
        // One background run of 8 becomes 10, spilling past the last row
        let payload_at = TABLE_OFFSET as usize + LAYER_RECORD_SIZE;
        source[payload_at] = 0x0A;

        let strict = LoadOptions::new().with_decode_mode(crate::raster::DecodeMode::Strict);
        let err = load_all(&source, header, &strict, &mut NoProgress).unwrap_err();
        assert_eq!(err.layer_index(), Some(0));
        assert!(matches!(err, Error::Layer { ref source, .. } if matches!(**source, Error::Range { row: 2, .. })));
    }

    #[test]
    fn test_log_progress_loads_all_layers() {
        let layers = vec![raster(3, 3, &[(1, 1)]), raster(3, 3, &[(1, 1)])];
        let (source, header) = build_source(3, 3, &layers);

        let mut sink = LogProgress;
        assert!(sink.report(0, 2, "ready").is_ok());
        let loaded = load_all(&source, header, &LoadOptions::default(), &mut sink).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].island_count(), 0);
    }
}
