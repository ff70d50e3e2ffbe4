//! Run-length codec for 1-bit layer rasters.
//!
//! ## Token Layout
//!
//! ```text
//!   bit 7      bits 6..0
//! +-------+-----------------+
//! | color |  run length     |   color: 1 = lit, 0 = background
//! +-------+-----------------+   length: 1..=127
//! ```
//!
//! Tokens are read in raster-scan order. A run that passes the end of a
//! row continues at column 0 of the next row, for as many rows as it spans.

use serde::{Deserialize, Serialize};

use super::Raster;
use crate::util::{Error, Result};

/// Longest run one token can carry.
pub const MAX_RUN: usize = 0x7F;

/// Color bit of a token.
pub const LIT_FLAG: u8 = 0x80;

/// Run-length bits of a token.
pub const RUN_MASK: u8 = 0x7F;

/// What to do with payloads whose runs do not cover exactly `width * height` pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Drop pixels past the last row and leave short payloads background-filled.
    #[default]
    Clamp,
    /// Fail with [`Error::Range`] on overflow and [`Error::Format`] on any run-sum mismatch.
    Strict,
}

/// Decoder output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub raster: Raster,
    /// Lit pixels written into the raster.
    pub pixels: u64,
}

/// Decode a payload with [`DecodeMode::Clamp`].
pub fn decode(bytes: &[u8], width: usize, height: usize) -> Result<Decoded> {
    decode_with(bytes, width, height, DecodeMode::Clamp)
}

/// Decode a run-length payload into a `width` x `height` raster.
pub fn decode_with(bytes: &[u8], width: usize, height: usize, mode: DecodeMode) -> Result<Decoded> {
    if width == 0 {
        return Err(Error::InvalidHeader("raster width must be non-zero".into()));
    }

    let mut raster = Raster::new(width, height);
    let mut pixels = 0u64;
    let mut covered = 0u64;
    let mut dropped = 0u64;
    let (mut row, mut col) = (0usize, 0usize);

    for &token in bytes {
        let length = (token & RUN_MASK) as usize;
        let lit = token & LIT_FLAG != 0;
        covered += length as u64;

        let mut remaining = length;
        while remaining > 0 {
            if row >= height {
                if mode == DecodeMode::Strict {
                    return Err(Error::Range { row, column: col });
                }
                dropped += remaining as u64;
                break;
            }
            let take = remaining.min(width - col);
            if lit {
                raster.row_mut(row).set_range(col, col + take);
                pixels += take as u64;
            }
            col += take;
            remaining -= take;
            if col == width {
                row += 1;
                col = 0;
            }
        }
    }

    let expected = width as u64 * height as u64;
    if covered != expected {
        if mode == DecodeMode::Strict {
            return Err(Error::Format { expected, actual: covered });
        }
        if dropped > 0 {
            tracing::warn!(dropped, expected, covered, "runs overflow the raster, clamped");
        } else {
            tracing::warn!(expected, covered, "runs end short of the raster, rest left blank");
        }
    }

    Ok(Decoded { raster, pixels })
}

/// Encode a raster into maximally compacted run-length tokens.
pub fn encode(raster: &Raster) -> Vec<u8> {
    let mut runs = RunBuilder::new(MAX_RUN, |lit, len| if lit != 0 { LIT_FLAG | len } else { len });
    let width = raster.width();
    for row in raster.rows() {
        let mut col = 0;
        while col < width {
            if row.get(col) {
                let end = row.next_clear(col).unwrap_or(width);
                runs.push(1, end - col);
                col = end;
            } else {
                let end = row.next_set(col).unwrap_or(width);
                runs.push(0, end - col);
                col = end;
            }
        }
    }
    runs.finish()
}

/// Sum of run lengths in a payload.
pub fn run_sum(bytes: &[u8]) -> u64 {
    bytes.iter().map(|&b| (b & RUN_MASK) as u64).sum()
}

/// Collapses consecutive same-code pixels into byte tokens.
pub(crate) struct RunBuilder {
    out: Vec<u8>,
    max_run: usize,
    pack: fn(u8, u8) -> u8,
    code: u8,
    len: usize,
}

impl RunBuilder {
    /// `pack(code, len)` builds one token byte; `len` never exceeds `max_run`.
    pub(crate) fn new(max_run: usize, pack: fn(u8, u8) -> u8) -> Self {
        Self { out: Vec::new(), max_run, pack, code: 0, len: 0 }
    }

    pub(crate) fn push(&mut self, code: u8, count: usize) {
        if count == 0 {
            return;
        }
        if self.len > 0 && code != self.code {
            self.flush();
        }
        self.code = code;
        self.len += count;
    }

    fn flush(&mut self) {
        let mut left = self.len;
        while left > 0 {
            let n = left.min(self.max_run);
            self.out.push((self.pack)(self.code, n as u8));
            left -= n;
        }
        self.len = 0;
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        self.flush();
        self.out
    }
}
