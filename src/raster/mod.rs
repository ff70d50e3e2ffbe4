//! Layer rasters and the run-length codec.
//!
//! A layer payload is a sequence of one-byte run tokens covering the
//! whole `width x height` raster in row-major order. Decoding produces a
//! [`Raster`] of word-packed rows; classification produces a
//! [`ClassifiedRaster`] that packs into a [`PackedOverlay`] for rendering.

mod bitmap;
mod codec;
mod overlay;

pub use bitmap::*;
pub use codec::{decode, decode_with, encode, run_sum, DecodeMode, Decoded, LIT_FLAG, MAX_RUN, RUN_MASK};
pub use overlay::*;
