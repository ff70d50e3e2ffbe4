//! Layer records and per-layer analysis.
//!
//! - [`LayerRecord`] - 36-byte metadata block plus encoded payload
//! - [`ClassificationEngine`] - Supported / island labelling against the previous layer
//! - [`check_margin`] - Lit pixels near the raster edges
//! - [`LayerSequenceLoader`] / [`load_all`] - Ordered load of a whole layer table

mod classify;
mod loader;
mod margin;
mod options;
mod record;

pub use classify::*;
pub use loader::*;
pub use margin::*;
pub use options::*;
pub use record::*;
