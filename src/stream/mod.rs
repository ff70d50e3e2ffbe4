//! Binary stream primitives used to pull fixed-width fields off a slice file.
//!
//! All multi-byte values are little-endian.

mod reader;
mod writer;

pub use reader::*;
pub use writer::*;
