// src/engine/encoder.rs
//
// Encoder operations: PNG (lossless), JPEG (fixed high quality), GIF (256-color palette)

use crate::error::IiifError;
use crate::request::Format;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Frame, ImageFormat};
use std::borrow::Cow;
use std::io::Cursor;

type EncoderResult<T> = std::result::Result<T, IiifError>;

/// JPEG quality used for every JPEG response.
pub const JPEG_QUALITY: u8 = 98;

/// NeuQuant sampling speed for GIF palettes (1 = best, 30 = fastest).
const GIF_QUANTIZE_SPEED: i32 = 10;

/// Encode `img` in `format`.
pub fn encode(img: &DynamicImage, format: Format) -> EncoderResult<Vec<u8>> {
    if img.width() == 0 || img.height() == 0 {
        return Err(IiifError::encode_failed(
            format.extension(),
            "image has no pixels",
        ));
    }
    match format {
        Format::Png => encode_png(img),
        Format::Jpeg => encode_jpeg(img, JPEG_QUALITY),
        Format::Gif => encode_gif(img),
    }
}

pub fn encode_png(img: &DynamicImage) -> EncoderResult<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| IiifError::encode_failed("png", format!("PNG encode failed: {e}")))?;
    Ok(buf)
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> EncoderResult<Vec<u8>> {
    // JPEG has no alpha; avoid conversion if already RGB8
    let rgb: Cow<'_, image::RgbImage> = match img {
        DynamicImage::ImageRgb8(rgb_img) => Cow::Borrowed(rgb_img),
        _ => Cow::Owned(img.to_rgb8()),
    };
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(rgb.as_ref())
        .map_err(|e| IiifError::encode_failed("jpeg", format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

pub fn encode_gif(img: &DynamicImage) -> EncoderResult<Vec<u8>> {
    let mut buf = Vec::new();
    {
        // The trailer is written when the encoder drops.
        let mut encoder = GifEncoder::new_with_speed(&mut buf, GIF_QUANTIZE_SPEED);
        encoder
            .encode_frame(Frame::new(img.to_rgba8()))
            .map_err(|e| IiifError::encode_failed("gif", format!("GIF encode failed: {e}")))?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbImage, RgbaImage};

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn create_test_image_rgba(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 200])
        }))
    }

    #[test]
    fn test_encode_png_is_lossless() {
        let img = create_test_image(50, 40);
        let bytes = encode(&img, Format::Png).unwrap();
        assert_eq!(&bytes[0..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn test_encode_jpeg_produces_valid_jpeg() {
        let bytes = encode(&create_test_image(100, 100), Format::Jpeg).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_jpeg_drops_alpha() {
        let bytes = encode(&create_test_image_rgba(32, 32), Format::Jpeg).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (32, 32));
    }

    #[test]
    fn test_encode_gif() {
        let bytes = encode(&create_test_image_rgba(30, 20), Format::Gif).unwrap();
        assert_eq!(&bytes[0..6], b"GIF89a");
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (30, 20));
    }

    #[test]
    fn test_encode_empty_image_fails() {
        let empty = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        for format in [Format::Png, Format::Jpeg, Format::Gif] {
            assert!(matches!(
                encode(&empty, format),
                Err(IiifError::EncodeFailed { .. })
            ));
        }
    }
}
