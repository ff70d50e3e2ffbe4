//! Three-way classified rasters and their packed overlay form.
//!
//! ## Overlay Token Layout
//!
//! ```text
//!   bits 7..6    bits 5..0
//! +-----------+--------------+
//! |   class   |  run length  |   class: 00 background, 01 supported, 10 island
//! +-----------+--------------+   length: 1..=63
//! ```
//!
//! Runs wrap across rows exactly like the stored 1-bit payload.

use smallvec::SmallVec;

use super::codec::RunBuilder;
use crate::util::{Error, Result};

/// Longest run one overlay token can carry.
pub const MAX_OVERLAY_RUN: usize = 0x3F;

const CLASS_SHIFT: u8 = 6;

/// Label of a single pixel after classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PixelClass {
    #[default]
    Background = 0,
    Supported = 1,
    Island = 2,
}

impl PixelClass {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Background),
            1 => Some(Self::Supported),
            2 => Some(Self::Island),
            _ => None,
        }
    }

    /// True for supported and island pixels.
    #[inline]
    pub fn is_lit(self) -> bool {
        self != Self::Background
    }
}

/// Dense per-pixel classification grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedRaster {
    width: usize,
    height: usize,
    cells: Vec<PixelClass>,
}

impl ClassifiedRaster {
    /// Create an all-background grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![PixelClass::Background; width * height],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Reset every pixel to background.
    pub fn clear(&mut self) {
        self.cells.fill(PixelClass::Background);
    }

    /// Class of a pixel; out-of-range pixels read as background.
    #[inline]
    pub fn get(&self, row: usize, column: usize) -> PixelClass {
        if row < self.height && column < self.width {
            self.cells[row * self.width + column]
        } else {
            PixelClass::Background
        }
    }

    /// Set the class of a pixel.
    pub fn set(&mut self, row: usize, column: usize, class: PixelClass) -> Result<()> {
        if row >= self.height || column >= self.width {
            return Err(Error::Range { row, column });
        }
        self.cells[row * self.width + column] = class;
        Ok(())
    }

    /// Unchecked set for callers that already walk in-range coordinates.
    #[inline]
    pub(crate) fn put(&mut self, row: usize, column: usize, class: PixelClass) {
        self.cells[row * self.width + column] = class;
    }

    /// Pixels of one row, `None` past the last row.
    pub fn row(&self, y: usize) -> Option<&[PixelClass]> {
        if y >= self.height {
            return None;
        }
        self.cells.get(y * self.width..(y + 1) * self.width)
    }

    /// Number of pixels with the given class.
    pub fn count(&self, class: PixelClass) -> usize {
        self.cells.iter().filter(|&&c| c == class).count()
    }

    /// Pack into overlay tokens.
    pub fn pack(&self) -> PackedOverlay {
        let mut runs = RunBuilder::new(MAX_OVERLAY_RUN, |code, len| (code << CLASS_SHIFT) | len);
        for &class in &self.cells {
            runs.push(class as u8, 1);
        }
        PackedOverlay {
            width: self.width,
            height: self.height,
            bytes: runs.finish(),
        }
    }
}

/// Run-length packed classification, kept per layer for rendering.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackedOverlay {
    width: usize,
    height: usize,
    bytes: Vec<u8>,
}

/// Horizontal run of one class inside a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlaySegment {
    pub start: usize,
    pub len: usize,
    pub class: PixelClass,
}

/// Lit segments of one overlay row, left to right. Background is implied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverlayRow {
    pub segments: SmallVec<[OverlaySegment; 8]>,
}

impl OverlayRow {
    fn push(&mut self, start: usize, len: usize, class: PixelClass) {
        if class == PixelClass::Background || len == 0 {
            return;
        }
        if let Some(last) = self.segments.last_mut() {
            if last.class == class && last.start + last.len == start {
                last.len += len;
                return;
            }
        }
        self.segments.push(OverlaySegment { start, len, class });
    }

    /// True when the row has no lit pixels.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl PackedOverlay {
    /// Wrap previously packed tokens.
    pub fn from_bytes(width: usize, height: usize, bytes: Vec<u8>) -> Self {
        Self { width, height, bytes }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Packed size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Walk the tokens, calling `f(row, start, len, class)` for every row piece.
    fn for_each_run(&self, mut f: impl FnMut(usize, usize, usize, PixelClass)) -> Result<()> {
        let (mut row, mut col) = (0usize, 0usize);
        for &token in &self.bytes {
            let class = PixelClass::from_code(token >> CLASS_SHIFT)
                .ok_or_else(|| Error::other(format!("invalid overlay class in token {token:#04x}")))?;
            let mut remaining = (token & MAX_OVERLAY_RUN as u8) as usize;
            while remaining > 0 {
                if row >= self.height || self.width == 0 {
                    return Err(Error::Range { row, column: col });
                }
                let take = remaining.min(self.width - col);
                f(row, col, take, class);
                col += take;
                remaining -= take;
                if col == self.width {
                    row += 1;
                    col = 0;
                }
            }
        }
        Ok(())
    }

    /// Unpack into per-row segment lists, one entry per raster row.
    pub fn rows(&self) -> Result<Vec<OverlayRow>> {
        let mut rows = vec![OverlayRow::default(); self.height];
        self.for_each_run(|row, start, len, class| rows[row].push(start, len, class))?;
        Ok(rows)
    }

    /// Unpack into a dense grid.
    pub fn unpack(&self) -> Result<ClassifiedRaster> {
        let mut grid = ClassifiedRaster::new(self.width, self.height);
        self.for_each_run(|row, start, len, class| {
            for x in start..start + len {
                grid.put(row, x, class);
            }
        })?;
        Ok(grid)
    }
}
