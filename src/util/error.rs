//! Error types for slice layer decoding and analysis.

use thiserror::Error;

/// Main error type for layer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Run lengths do not add up to the raster area
    #[error("Run lengths cover {actual} pixels, expected {expected}")]
    Format { expected: u64, actual: u64 },

    /// A pixel coordinate falls outside the raster
    #[error("Pixel ({row}, {column}) is outside the raster")]
    Range { row: usize, column: usize },

    /// Source buffer ends before the requested range
    #[error("Source truncated: {len} bytes at offset {offset}, only {available} available")]
    SourceTruncated { offset: u64, len: u64, available: u64 },

    /// Header values the loader cannot work with
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Layer record fields that cannot locate a payload
    #[error("Invalid layer record: {0}")]
    InvalidRecord(String),

    /// Two rasters of different shape were compared
    #[error("Raster dimensions differ: expected {expected:?}, got {actual:?}")]
    DimensionMismatch { expected: (usize, usize), actual: (usize, usize) },

    /// Failure while loading a specific layer
    #[error("Layer {index}: {source}")]
    Layer {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Options file could not be parsed
    #[error("Invalid options: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid record error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Attach a layer index to an error raised while loading or saving that layer.
    pub fn layer(index: usize, source: Error) -> Self {
        Self::Layer { index, source: Box::new(source) }
    }

    /// Index of the failing layer, if known.
    pub fn layer_index(&self) -> Option<usize> {
        match self {
            Self::Layer { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Result type alias for layer operations.
pub type Result<T> = std::result::Result<T, Error>;
