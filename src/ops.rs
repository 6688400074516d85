// src/ops.rs
//
// Pipeline operations.
// A request is planned into a short, fixed-order list of these; the
// expensive work happens in engine::pipeline::apply_ops().

use crate::request::{Region, Request, Size};

/// Orientation fix-up derived from the EXIF Orientation tag.
///
/// Rotation names count counter-clockwise: `Rotate270` turns the image a
/// quarter clockwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Identity,
    FlipVertical,
    Rotate180,
    FlipHorizontal,
    /// Flip vertically, then rotate 270°.
    FlipVerticalRotate270,
    Rotate270,
    /// Flip horizontally, then rotate 270°.
    FlipHorizontalRotate270,
    Rotate90,
}

impl Orientation {
    /// Maps EXIF codes 2..=8; `1`, unknown codes and a missing tag are identity.
    pub fn from_exif(code: Option<u16>) -> Self {
        match code {
            Some(2) => Self::FlipVertical,
            Some(3) => Self::Rotate180,
            Some(4) => Self::FlipHorizontal,
            Some(5) => Self::FlipVerticalRotate270,
            Some(6) => Self::Rotate270,
            Some(7) => Self::FlipHorizontalRotate270,
            Some(8) => Self::Rotate90,
            _ => Self::Identity,
        }
    }

    /// True when width and height trade places.
    pub fn swaps_axes(&self) -> bool {
        matches!(
            self,
            Self::FlipVerticalRotate270
                | Self::Rotate270
                | Self::FlipHorizontalRotate270
                | Self::Rotate90
        )
    }
}

/// A single pipeline stage.
///
/// Design principle: each operation is self-contained and stateless.
/// Crop and scale resolve against the image bounds at the time they run.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// Undo the camera orientation
    Orient(Orientation),

    /// Remove a uniform border; fuzz in [0, 1]
    Trim { fuzz: f64 },

    /// Select a region of the current image
    Crop(Region),

    /// Resample to the size's target dimensions
    Scale(Size),
}

impl Operation {
    /// Plans the fixed stage order: orient, trim, crop, scale.
    ///
    /// No-op stages are left out, so a plain full/full request plans to a
    /// single Scale that resolves to the input size.
    pub fn plan(request: &Request, orientation: Orientation) -> Vec<Operation> {
        let mut ops = Vec::with_capacity(4);
        if request.auto_orient && orientation != Orientation::Identity {
            ops.push(Operation::Orient(orientation));
        }
        if request.trim_border {
            ops.push(Operation::Trim {
                fuzz: request.trim_border_fuzziness,
            });
        }
        if request.region != Region::Full {
            ops.push(Operation::Crop(request.region));
        }
        ops.push(Operation::Scale(request.size));
        ops
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Orient(_) => "orient",
            Operation::Trim { .. } => "trim",
            Operation::Crop(_) => "crop",
            Operation::Scale(_) => "scale",
        }
    }
}
