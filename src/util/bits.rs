//! Fixed-width bit rows.
//!
//! A [`BitRow`] holds the lit columns of one raster row packed into
//! 64-bit words, so row-to-row AND / AND-NOT is a word loop.

const WORD_BITS: usize = 64;

/// Set of lit column indices in `[0, width)`.
///
/// Bits at or past `width` are never set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BitRow {
    width: usize,
    words: Vec<u64>,
}

impl BitRow {
    /// Create an empty row of the given width.
    pub fn new(width: usize) -> Self {
        Self {
            width,
            words: vec![0; width.div_ceil(WORD_BITS)],
        }
    }

    /// Create a row with the given columns set. Columns past `width` are ignored.
    pub fn from_columns(width: usize, columns: impl IntoIterator<Item = usize>) -> Self {
        let mut row = Self::new(width);
        for col in columns {
            row.set(col);
        }
        row
    }

    /// Row width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Check whether a column is set.
    #[inline]
    pub fn get(&self, col: usize) -> bool {
        col < self.width && self.words[col / WORD_BITS] & (1u64 << (col % WORD_BITS)) != 0
    }

    /// Set a single column. Out-of-range columns are ignored.
    #[inline]
    pub fn set(&mut self, col: usize) {
        if col < self.width {
            self.words[col / WORD_BITS] |= 1u64 << (col % WORD_BITS);
        }
    }

    /// Clear a single column.
    #[inline]
    pub fn unset(&mut self, col: usize) {
        if col < self.width {
            self.words[col / WORD_BITS] &= !(1u64 << (col % WORD_BITS));
        }
    }

    /// Set columns `start..end`, clamped to the row width.
    pub fn set_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.width);
        if start >= end {
            return;
        }
        let first = start / WORD_BITS;
        let last = (end - 1) / WORD_BITS;
        for w in first..=last {
            let lo = if w == first { start % WORD_BITS } else { 0 };
            let hi = if w == last { (end - 1) % WORD_BITS } else { WORD_BITS - 1 };
            let mask = (u64::MAX >> (WORD_BITS - 1 - hi)) & (u64::MAX << lo);
            self.words[w] |= mask;
        }
    }

    /// Clear every column.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// True when no column is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Number of set columns.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// First set column at or after `from`.
    pub fn next_set(&self, from: usize) -> Option<usize> {
        self.next_matching(from, false)
    }

    /// First clear column at or after `from`.
    pub fn next_clear(&self, from: usize) -> Option<usize> {
        self.next_matching(from, true)
    }

    fn next_matching(&self, from: usize, invert: bool) -> Option<usize> {
        if from >= self.width {
            return None;
        }
        let load = |w: usize| if invert { !self.words[w] } else { self.words[w] };
        let mut w = from / WORD_BITS;
        let mut bits = load(w) & (u64::MAX << (from % WORD_BITS));
        loop {
            if bits != 0 {
                let col = w * WORD_BITS + bits.trailing_zeros() as usize;
                return (col < self.width).then_some(col);
            }
            w += 1;
            if w >= self.words.len() {
                return None;
            }
            bits = load(w);
        }
    }

    /// Iterate set columns in ascending order.
    pub fn iter_ones(&self) -> Ones<'_> {
        Ones { row: self, next: 0 }
    }

    /// Columns set in both rows.
    pub fn intersection(&self, other: &BitRow) -> BitRow {
        self.zip_words(other, |a, b| a & b)
    }

    /// Columns set in `self` but not in `other`.
    pub fn difference(&self, other: &BitRow) -> BitRow {
        self.zip_words(other, |a, b| a & !b)
    }

    fn zip_words(&self, other: &BitRow, op: impl Fn(u64, u64) -> u64) -> BitRow {
        let words = self
            .words
            .iter()
            .enumerate()
            .map(|(i, &a)| op(a, other.words.get(i).copied().unwrap_or(0)))
            .collect();
        BitRow { width: self.width, words }
    }
}

/// Iterator over the set columns of a [`BitRow`].
pub struct Ones<'a> {
    row: &'a BitRow,
    next: usize,
}

impl Iterator for Ones<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let col = self.row.next_set(self.next)?;
        self.next = col + 1;
        Some(col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_range_across_words() {
        let mut row = BitRow::new(200);
        row.set_range(60, 130);
        assert_eq!(row.count_ones(), 70);
        assert!(!row.get(59));
        assert!(row.get(60));
        assert!(row.get(129));
        assert!(!row.get(130));
    }

    #[test]
    fn test_set_range_clamps_to_width() {
        let mut row = BitRow::new(10);
        row.set_range(8, 50);
        assert_eq!(row.iter_ones().collect::<Vec<_>>(), vec![8, 9]);
        row.set(10);
        assert_eq!(row.count_ones(), 2);
    }

    #[test]
    fn test_next_set_and_clear() {
        let row = BitRow::from_columns(70, [3, 4, 66]);
        assert_eq!(row.next_set(0), Some(3));
        assert_eq!(row.next_set(5), Some(66));
        assert_eq!(row.next_set(67), None);
        assert_eq!(row.next_clear(3), Some(5));
        assert_eq!(row.next_clear(66), Some(67));

        let full = {
            let mut r = BitRow::new(70);
            r.set_range(0, 70);
            r
        };
        assert_eq!(full.next_clear(0), None);
    }

    #[test]
    fn test_intersection_and_difference() {
        let a = BitRow::from_columns(8, [0, 1, 2, 5]);
        let b = BitRow::from_columns(8, [1, 5, 7]);
        assert_eq!(a.intersection(&b).iter_ones().collect::<Vec<_>>(), vec![1, 5]);
        assert_eq!(a.difference(&b).iter_ones().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_empty_and_clear() {
        let mut row = BitRow::from_columns(16, [15]);
        assert!(!row.is_empty());
        row.unset(15);
        assert!(row.is_empty());
        row.set_range(0, 16);
        row.clear();
        assert!(row.is_empty());
    }
}
