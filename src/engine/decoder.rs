// src/engine/decoder.rs
//
// Decoder operations: format sniffing, size guard, decode, EXIF orientation.

use super::limits::Limits;
use crate::error::IiifError;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

type DecoderResult<T> = std::result::Result<T, IiifError>;

/// Detect image format from magic bytes.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Lower-case codec name, e.g. `"jpeg"`.
pub fn format_name(format: ImageFormat) -> String {
    format!("{format:?}").to_lowercase()
}

/// Reads the header and rejects images too large to decode safely.
/// Headers that cannot be read are left for the decoder to report.
pub fn ensure_dimensions_safe(bytes: &[u8], limits: &Limits) -> DecoderResult<()> {
    let cursor = Cursor::new(bytes);
    if let Ok(reader) = ImageReader::new(cursor).with_guessed_format() {
        if let Ok((width, height)) = reader.into_dimensions() {
            return limits.enforce_source_dimensions(width, height);
        }
    }
    Ok(())
}

/// Decode bytes into pixels, returning the detected source format alongside.
pub fn decode_image(
    bytes: &[u8],
    limits: &Limits,
) -> DecoderResult<(DynamicImage, Option<ImageFormat>)> {
    ensure_dimensions_safe(bytes, limits)?;
    let detected = detect_format(bytes);
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| IiifError::decode_failed(format!("failed to read image header: {e}")))?;
    let img = reader
        .decode()
        .map_err(|e| IiifError::decode_failed(e.to_string()))?;
    Ok((img, detected))
}

/// Extract EXIF Orientation tag (1-8). Returns None if missing or invalid.
pub fn detect_exif_orientation(bytes: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(bytes);
    let exif_reader = exif::Reader::new();
    let exif = exif_reader.read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    // exif crate can represent as Short/Long; use get_uint for safety
    let value = field.value.get_uint(0)?;
    let orientation = u16::try_from(value).ok()?;
    if (1..=8).contains(&orientation) {
        Some(orientation)
    } else {
        None
    }
}
