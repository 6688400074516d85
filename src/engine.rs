// src/engine.rs
//
// The image core of iiif-pipe. A request becomes a fixed pipeline that:
// 1. Decodes the source bytes under size guards
// 2. Runs orient, trim, crop and scale in a single pass
// 3. Encodes once, after every step has succeeded
//
// This file is a facade over the modules in engine/

use crate::geometry::Dimensions;

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed source dimension (width or height).
/// Larger sources are rejected before decoding to stop decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total source pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

/// Default ceiling for any scale result.
pub const MAX_SCALE_SIZE: Dimensions = Dimensions::new(6000, 6000);

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod decoder;
mod encoder;
mod limits;
mod pipeline;
mod processor;
mod trim;

pub use decoder::{decode_image, detect_exif_orientation, detect_format, format_name};
pub use encoder::{encode, encode_gif, encode_jpeg, encode_png, JPEG_QUALITY};
pub use limits::Limits;
pub use pipeline::{apply_ops, crop, fast_resize_owned, orient, scale, ResizeError};
pub use processor::{ProcessResult, Processor};
pub use trim::{color_distance, trim};
