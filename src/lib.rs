//! # Resin Layers
//!
//! Layer raster decoding and support analysis for resin printer slice files.
//!
//! Every layer of a slice file stores a 1-bit raster as run-length tokens.
//! This crate decodes those rasters, compares each layer with the one
//! below it to find unsupported "island" pixels, and flags layers that
//! reach into a margin band along the build-plate edges.
//!
//! ## Modules
//!
//! - [`util`] - Bit rows and errors
//! - [`stream`] - Little-endian byte reader / writer
//! - [`raster`] - Rasters, run-length codec, classified overlays
//! - [`layer`] - Layer records, classification, margin check, sequential loader
//!
//! ## Example
//!
//! ```ignore
//! use resin_layers::prelude::*;
//!
//! let bytes = std::fs::read("part.photon")?;
//! let header = SliceHeader::new(1440, 2560, layer_count, table_offset);
//! let layers = load_all(&bytes, header, &LoadOptions::new().with_margin(10), &mut NoProgress)?;
//!
//! for (i, layer) in layers.iter().enumerate() {
//!     println!("{i}: {} islands", layer.island_count());
//! }
//! ```

pub mod util;
pub mod stream;
pub mod raster;
pub mod layer;

// Re-export commonly used types
pub use util::{BitRow, Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{BitRow, Error, Result};
    pub use crate::raster::{decode, decode_with, encode, DecodeMode, PixelClass, Raster};
    pub use crate::layer::{
        check_margin, load_all, ClassificationEngine, Connectivity, IslandPolicy, LayerRecord,
        LayerSequenceLoader, LoadOptions, LogProgress, NoProgress, ProgressSink, SliceHeader,
    };
    pub use crate::stream::{ByteReader, ByteWriter};
}
