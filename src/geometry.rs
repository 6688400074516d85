// src/geometry.rs
//
// Pure geometry: rectangles, relative regions and aspect-preserving fitting.
// Every rounding step uses round-half-up so results are reproducible.

use crate::error::{IiifError, Result};

/// Width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either axis is larger than `other`'s.
    pub fn exceeds(&self, other: Dimensions) -> bool {
        self.width > other.width || self.height > other.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle, min inclusive, max exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Rect {
    /// Builds a canonical rectangle from two corners in any order.
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Rectangle covering an image of the given size.
    pub fn from_dimensions(dims: Dimensions) -> Self {
        Self::new(0, 0, clamp_to_i32(dims.width as i64), clamp_to_i32(dims.height as i64))
    }

    pub fn dx(&self) -> u32 {
        (self.x1 as i64 - self.x0 as i64).max(0) as u32
    }

    pub fn dy(&self) -> u32 {
        (self.y1 as i64 - self.y0 as i64).max(0) as u32
    }

    pub fn size(&self) -> Dimensions {
        Dimensions::new(self.dx(), self.dy())
    }

    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    /// Largest rectangle contained by both; the zero rectangle when they don't overlap.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let r = Rect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        if r.is_empty() {
            Rect::default()
        } else {
            r
        }
    }
}

/// Region expressed as fractions of the image size, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeRegion {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl RelativeRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self> {
        for value in [x, y, width, height] {
            if !(0.0..=1.0).contains(&value) {
                return Err(IiifError::invalid_spec(format!(
                    "Invalid relative coordinates: {x}, {y}, {width}, {height}"
                )));
            }
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Converts to pixels against `bounds`, clipped to `bounds`.
    pub fn to_rectangle(&self, bounds: &Rect) -> Rect {
        let w = bounds.dx() as f64;
        let h = bounds.dy() as f64;
        let x0 = self.x * w;
        let y0 = self.y * h;
        Rect::new(
            clamp_to_i32(round_half_up(x0)),
            clamp_to_i32(round_half_up(y0)),
            clamp_to_i32(round_half_up(x0 + self.width * w)),
            clamp_to_i32(round_half_up(y0 + self.height * h)),
        )
        .intersect(bounds)
    }
}

/// `floor(f + 0.5)`.
pub fn round_half_up(f: f64) -> i64 {
    (f + 0.5).floor() as i64
}

fn clamp_to_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn clamp_to_u32(v: i64) -> u32 {
    v.clamp(0, u32::MAX as i64) as u32
}

/// Fits `size` to the requested width and/or height, preserving aspect ratio.
///
/// With both targets the result fits inside the box. With one target the
/// other axis is derived from the aspect ratio. With none, `size` is returned.
pub fn fit_dimensions(size: Dimensions, width: Option<u32>, height: Option<u32>) -> Dimensions {
    if width.is_none() && height.is_none() {
        return size;
    }
    if size.is_empty() || width == Some(0) || height == Some(0) {
        return Dimensions::default();
    }

    let sw = size.width as f64;
    let sh = size.height as f64;
    match (width, height) {
        (Some(w), Some(h)) => {
            let scale = (w as f64 / sw).min(h as f64 / sh);
            Dimensions::new(
                clamp_to_u32(round_half_up(sw * scale)),
                clamp_to_u32(round_half_up(sh * scale)),
            )
        }
        (Some(w), None) => {
            let aspect = sw / sh;
            Dimensions::new(w, clamp_to_u32(round_half_up(w as f64 / aspect)))
        }
        (None, Some(h)) => {
            let aspect = sw / sh;
            Dimensions::new(clamp_to_u32(round_half_up(h as f64 * aspect)), h)
        }
        (None, None) => size,
    }
}
