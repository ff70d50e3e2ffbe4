//! Utility types shared by the codec and the analysis passes.
//!
//! - [`BitRow`] - Word-packed set of lit columns
//! - [`Error`] / [`Result`] - Error handling

mod bits;
mod error;

pub use bits::*;
pub use error::*;
