//! Decoded 1-bit layer raster.

use crate::util::{BitRow, Error, Result};

/// Row-major bitmap of one layer: `height` rows of `width` columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    width: usize,
    rows: Vec<BitRow>,
}

impl Raster {
    /// Create an all-background raster.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            rows: (0..height).map(|_| BitRow::new(width)).collect(),
        }
    }

    /// Build a raster from existing rows. Every row must have `width` columns.
    pub fn from_rows(width: usize, rows: Vec<BitRow>) -> Result<Self> {
        if let Some(bad) = rows.iter().find(|r| r.width() != width) {
            return Err(Error::DimensionMismatch {
                expected: (width, rows.len()),
                actual: (bad.width(), rows.len()),
            });
        }
        Ok(Self { width, rows })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// (width, height)
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.rows.len())
    }

    #[inline]
    pub fn rows(&self) -> &[BitRow] {
        &self.rows
    }

    #[inline]
    pub fn row(&self, y: usize) -> Option<&BitRow> {
        self.rows.get(y)
    }

    pub(crate) fn row_mut(&mut self, y: usize) -> &mut BitRow {
        &mut self.rows[y]
    }

    /// Check whether a pixel is lit. Out-of-range pixels are unlit.
    pub fn get(&self, row: usize, column: usize) -> bool {
        self.rows.get(row).is_some_and(|r| r.get(column))
    }

    /// Light a pixel.
    pub fn set(&mut self, row: usize, column: usize) -> Result<()> {
        if column >= self.width || row >= self.rows.len() {
            return Err(Error::Range { row, column });
        }
        self.rows[row].set(column);
        Ok(())
    }

    /// Total lit pixels.
    pub fn lit_pixels(&self) -> u64 {
        self.rows.iter().map(|r| r.count_ones() as u64).sum()
    }

    /// True when no pixel is lit.
    pub fn is_blank(&self) -> bool {
        self.rows.iter().all(BitRow::is_empty)
    }
}
