// src/request.rs
//
// Request model for the IIIF-style grammar:
//   {identifier}/{region}/{size}/{rotation}/{quality}.{format}[?{query}]
//
// `Display` produces the canonical form used as the cache key; parsing lives
// in the `parse` submodule.

mod parse;

pub use parse::parse;

use crate::error::{IiifError, Result};
use crate::geometry::{fit_dimensions, round_half_up, Dimensions, Rect, RelativeRegion};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt;
use std::str::FromStr;

/// Characters left as-is when writing the identifier segment.
const IDENTIFIER_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A fully validated image request. Built once per call and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub identifier: String,
    pub region: Region,
    pub size: Size,
    pub format: Format,
    pub auto_orient: bool,
    pub trim_border: bool,
    pub trim_border_fuzziness: f64,
}

impl Request {
    /// Request for the whole image at full size with every modifier off.
    pub fn new(identifier: impl Into<String>, format: Format) -> Self {
        Self {
            identifier: identifier.into(),
            region: Region::Full,
            size: Size::Full,
            format,
            auto_orient: false,
            trim_border: false,
            trim_border_fuzziness: 0.0,
        }
    }
}

impl FromStr for Request {
    type Err = IiifError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/0/default.{}",
            utf8_percent_encode(&self.identifier, IDENTIFIER_ESCAPE),
            self.region,
            self.size,
            self.format.extension()
        )?;

        let mut extras = Vec::new();
        if self.auto_orient {
            extras.push("autoOrient=true".to_string());
        }
        if self.trim_border {
            extras.push(format!(
                "trimBorder={}",
                format_compact_float(self.trim_border_fuzziness)
            ));
        }
        if let Size::Absolute {
            do_not_enlarge: true,
            ..
        } = self.size
        {
            extras.push("scale=down".to_string());
        }
        if !extras.is_empty() {
            write!(f, "?{}", extras.join("&"))?;
        }
        Ok(())
    }
}

/// The portion of the source image to select.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Region {
    Full,
    Square,
    Absolute(Rect),
    Relative(RelativeRegion),
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Full => f.write_str("full"),
            Region::Square => f.write_str("square"),
            Region::Absolute(rect) => {
                write!(f, "{},{},{},{}", rect.x0, rect.y0, rect.dx(), rect.dy())
            }
            Region::Relative(region) => write!(
                f,
                "pct:{},{},{},{}",
                format_compact_float(region.x() * 100.0),
                format_compact_float(region.y() * 100.0),
                format_compact_float(region.width() * 100.0),
                format_compact_float(region.height() * 100.0)
            ),
        }
    }
}

/// Target pixel dimensions for the selected region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Size {
    Full,
    Max,
    Absolute {
        width: Option<u32>,
        height: Option<u32>,
        best_fit: bool,
        do_not_enlarge: bool,
    },
    /// Scale factor in [0, 1].
    Relative(f64),
}

impl Size {
    /// Resolves this size against the current image size.
    ///
    /// The result never exceeds `max_allowed`; exceeding it is reported as
    /// [`IiifError::DimensionExceeded`].
    pub fn calculate_dimensions(
        &self,
        input: Dimensions,
        max_allowed: Dimensions,
    ) -> Result<Dimensions> {
        let result = match *self {
            Size::Full => input,
            Size::Max => {
                if input.exceeds(max_allowed) {
                    fit_dimensions(input, Some(max_allowed.width), Some(max_allowed.height))
                } else {
                    input
                }
            }
            Size::Absolute {
                width,
                height,
                best_fit,
                do_not_enlarge,
            } => {
                let computed = match (width, height) {
                    (Some(w), Some(h)) if !best_fit => Dimensions::new(w, h),
                    _ => fit_dimensions(input, width, height),
                };
                if do_not_enlarge && computed.exceeds(input) {
                    input
                } else {
                    computed
                }
            }
            Size::Relative(factor) => {
                let w = round_half_up(input.width as f64 * factor).clamp(0, u32::MAX as i64);
                let h = round_half_up(input.height as f64 * factor).clamp(0, u32::MAX as i64);
                fit_dimensions(input, Some(w as u32), Some(h as u32))
            }
        };

        if result.exceeds(max_allowed) {
            return Err(IiifError::dimension_exceeded(
                result.width,
                result.height,
                max_allowed.width,
                max_allowed.height,
            ));
        }
        Ok(result)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Full => f.write_str("full"),
            Size::Max => f.write_str("max"),
            Size::Relative(factor) => write!(f, "pct:{}", format_compact_float(factor * 100.0)),
            Size::Absolute {
                width,
                height,
                best_fit,
                ..
            } => {
                if *best_fit && width.is_some() && height.is_some() {
                    f.write_str("!")?;
                }
                if let Some(w) = width {
                    write!(f, "{w}")?;
                }
                f.write_str(",")?;
                if let Some(h) = height {
                    write!(f, "{h}")?;
                }
                Ok(())
            }
        }
    }
}

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Jpeg,
    Png,
    Gif,
}

impl Format {
    /// Maps a request extension to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" => Some(Format::Jpeg),
            "png" => Some(Format::Png),
            "gif" => Some(Format::Gif),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Jpeg => "jpg",
            Format::Png => "png",
            Format::Gif => "gif",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Jpeg => "image/jpeg",
            Format::Png => "image/png",
            Format::Gif => "image/gif",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Up to 10 decimals, trailing zeros and a bare trailing point removed.
pub(crate) fn format_compact_float(value: f64) -> String {
    let formatted = format!("{value:.10}");
    let trimmed = formatted.trim_end_matches('0');
    trimmed.strip_suffix('.').unwrap_or(trimmed).to_string()
}
