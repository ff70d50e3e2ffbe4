//! Load-time options.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::IslandPolicy;
use crate::raster::DecodeMode;
use crate::util::Result;

/// Options for a sequential layer load. Missing JSON fields take defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Margin band in pixels; 0 skips the margin check.
    pub margin: u32,
    pub decode: DecodeMode,
    pub islands: IslandPolicy,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_decode_mode(mut self, mode: DecodeMode) -> Self {
        self.decode = mode;
        self
    }

    pub fn with_island_policy(mut self, policy: IslandPolicy) -> Self {
        self.islands = policy;
        self
    }

    /// Parse options from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
