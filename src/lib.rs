// lib.rs
//
// iiif-pipe: an IIIF-style image delivery endpoint
//
// A request names a source image by URL plus region, size and format. The
// library parses it, fetches the source, then orients, trims, crops, scales
// and encodes in one pass.

pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod ops;
pub mod request;
pub mod resolver;
pub mod server;

pub use engine::{Limits, ProcessResult, Processor};
pub use error::{ErrorCategory, IiifError, Result};
pub use geometry::{Dimensions, Rect, RelativeRegion};
pub use request::{parse, Format, Region, Request, Size};
pub use resolver::{HttpResolver, ResourceResolver, LOOP_DETECTION_HEADER};
