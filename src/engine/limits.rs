// src/engine/limits.rs
//
// Processing limits and enforcement helpers.
// Shared read-only by every worker.

use super::{MAX_DIMENSION, MAX_PIXELS, MAX_SCALE_SIZE};
use crate::error::IiifError;
use crate::geometry::Dimensions;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Hard ceiling for output dimensions.
    pub max_scale_size: Dimensions,
    /// Decoded-source pixel ceiling (decompression-bomb guard).
    pub max_source_pixels: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_scale_size: MAX_SCALE_SIZE,
            max_source_pixels: MAX_PIXELS,
        }
    }
}

impl Limits {
    pub fn with_max_scale_size(mut self, max: Dimensions) -> Self {
        self.max_scale_size = max;
        self
    }

    pub fn with_max_source_pixels(mut self, max: u64) -> Self {
        self.max_source_pixels = max.min(MAX_PIXELS);
        self
    }

    /// Rejects sources whose header dimensions are unsafe to decode.
    pub fn enforce_source_dimensions(&self, width: u32, height: u32) -> Result<(), IiifError> {
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(IiifError::dimension_exceeds_limit(
                width.max(height),
                MAX_DIMENSION,
            ));
        }
        let pixels = width as u64 * height as u64;
        if pixels > self.max_source_pixels {
            return Err(IiifError::pixel_count_exceeds_limit(
                pixels,
                self.max_source_pixels,
            ));
        }
        Ok(())
    }
}
