// src/engine/pipeline.rs
//
// Pipeline operations: apply_ops, cropping, resize

use super::limits::Limits;
use super::trim::trim;
use crate::error::IiifError;
use crate::geometry::{Dimensions, Rect};
use crate::ops::{Operation, Orientation};
use crate::request::Region;
use fast_image_resize::{self as fir, MulDiv, PixelType, ResizeOptions};
use image::{imageops::FilterType, DynamicImage, RgbImage, RgbaImage};
use tracing::debug;

// Type alias for Result - always use IiifError to preserve error taxonomy
type PipelineResult<T> = std::result::Result<T, IiifError>;

#[derive(Debug)]
pub struct ResizeError {
    pub source_dims: (u32, u32),
    pub target_dims: (u32, u32),
    pub reason: String,
}

impl ResizeError {
    pub fn new(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        reason: impl Into<String>,
    ) -> Self {
        Self {
            source_dims,
            target_dims,
            reason: reason.into(),
        }
    }

    pub fn into_iiif_error(self) -> IiifError {
        IiifError::resize_failed(self.source_dims, self.target_dims, self.reason)
    }
}

/// Apply planned operations in order.
///
/// Crop and scale resolve against the bounds of the image as it is when they
/// run, so an orientation swap or a trim changes what they see.
pub fn apply_ops(
    mut img: DynamicImage,
    ops: &[Operation],
    limits: &Limits,
) -> PipelineResult<DynamicImage> {
    for op in ops {
        img = match op {
            Operation::Orient(orientation) => orient(img, *orientation),
            Operation::Trim { fuzz } => trim(img, *fuzz),
            Operation::Crop(region) => crop(img, region),
            Operation::Scale(size) => {
                let current = Dimensions::new(img.width(), img.height());
                let target = size.calculate_dimensions(current, limits.max_scale_size)?;
                scale(img, target)?
            }
        };
        debug!(
            op = op.name(),
            width = img.width(),
            height = img.height(),
            "applied operation"
        );
    }
    Ok(img)
}

pub fn orient(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    // image's rotateN turns clockwise; Orientation counts counter-clockwise.
    match orientation {
        Orientation::Identity => img,
        Orientation::FlipVertical => img.flipv(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::FlipVerticalRotate270 => img.flipv().rotate90(),
        Orientation::Rotate270 => img.rotate90(),
        Orientation::FlipHorizontalRotate270 => img.fliph().rotate90(),
        Orientation::Rotate90 => img.rotate270(),
    }
}

/// Crop to a region of the current image.
pub fn crop(img: DynamicImage, region: &Region) -> DynamicImage {
    let bounds = Rect::from_dimensions(Dimensions::new(img.width(), img.height()));
    let rect = match region {
        Region::Full => return img,
        Region::Square => {
            let (dx, dy) = (bounds.dx(), bounds.dy());
            let side = dx.min(dy);
            // Centre-anchored: halve each extent before subtracting.
            let x = (dx / 2 - side / 2) as i32;
            let y = (dy / 2 - side / 2) as i32;
            Rect::new(x, y, x + side as i32, y + side as i32)
        }
        Region::Absolute(rect) => rect.intersect(&bounds),
        Region::Relative(relative) => relative.to_rectangle(&bounds),
    };
    if rect == bounds {
        return img;
    }
    // Both rects live inside `bounds`, so the origin is non-negative.
    img.crop_imm(rect.x0 as u32, rect.y0 as u32, rect.dx(), rect.dy())
}

/// Resample to `target` with Lanczos3.
///
/// Equal size is a no-op; a zero axis yields an empty image.
pub fn scale(img: DynamicImage, target: Dimensions) -> PipelineResult<DynamicImage> {
    if (target.width, target.height) == (img.width(), img.height()) {
        return Ok(img);
    }
    if target.is_empty() || img.width() == 0 || img.height() == 0 {
        return Ok(DynamicImage::ImageRgba8(RgbaImage::new(0, 0)));
    }
    fast_resize_owned(img, target.width, target.height).map_err(ResizeError::into_iiif_error)
}

/// Lanczos3 resize through fast_image_resize, falling back to the image crate.
///
/// RGB8 and RGBA8 buffers are moved into the resizer; other layouts are
/// converted to RGBA8 first.
pub fn fast_resize_owned(
    img: DynamicImage,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<DynamicImage, ResizeError> {
    let (src_width, src_height) = (img.width(), img.height());
    let resize_error =
        |reason: String| ResizeError::new((src_width, src_height), (dst_width, dst_height), reason);

    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(resize_error("invalid dimensions for resize".to_string()));
    }

    let (pixel_type, mut src_pixels): (PixelType, Vec<u8>) = match img {
        DynamicImage::ImageRgb8(rgb) => (PixelType::U8x3, rgb.into_raw()),
        DynamicImage::ImageRgba8(rgba) => (PixelType::U8x4, rgba.into_raw()),
        other => (PixelType::U8x4, other.to_rgba8().into_raw()),
    };

    let primary = fir::images::Image::from_slice_u8(
        src_width,
        src_height,
        src_pixels.as_mut_slice(),
        pixel_type,
    )
    .map_err(|e| format!("fir source image error: {e:?}"))
    .and_then(|src_image| resize_with_fir(src_image, pixel_type, dst_width, dst_height));

    match primary {
        Ok(img) => Ok(img),
        Err(err) => {
            debug!(%err, "fast resize failed, using image crate");
            resize_with_image_crate(
                src_pixels, src_width, src_height, pixel_type, dst_width, dst_height,
            )
            .map_err(|fallback| {
                resize_error(format!("{err}; image crate fallback failed: {fallback}"))
            })
        }
    }
}

fn resize_with_image_crate(
    src_pixels: Vec<u8>,
    src_width: u32,
    src_height: u32,
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<DynamicImage, String> {
    let filter = FilterType::Lanczos3;
    match pixel_type {
        PixelType::U8x3 => {
            let rgb = RgbImage::from_raw(src_width, src_height, src_pixels)
                .ok_or("failed to build rgb image for fallback resize")?;
            Ok(DynamicImage::ImageRgb8(image::imageops::resize(
                &rgb, dst_width, dst_height, filter,
            )))
        }
        PixelType::U8x4 => {
            let rgba = RgbaImage::from_raw(src_width, src_height, src_pixels)
                .ok_or("failed to build rgba image for fallback resize")?;
            Ok(DynamicImage::ImageRgba8(image::imageops::resize(
                &rgba, dst_width, dst_height, filter,
            )))
        }
        _ => Err("fallback resize supports only U8x3/U8x4 pixel types".to_string()),
    }
}

/// Only RGBA with at least one translucent pixel needs premultiplying.
fn needs_premultiply(image: &fir::images::Image, pixel_type: PixelType) -> bool {
    pixel_type == PixelType::U8x4
        && image.buffer().iter().skip(3).step_by(4).any(|&alpha| alpha != 255)
}

fn resize_with_fir(
    mut src_image: fir::images::Image<'_>,
    pixel_type: PixelType,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<DynamicImage, String> {
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, pixel_type);
    let premultiply = needs_premultiply(&src_image, pixel_type);

    let mul_div = MulDiv::default();
    if premultiply {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| format!("failed to premultiply alpha: {e}"))?;
    }

    let mut resizer = fir::Resizer::new();
    let options =
        ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    if premultiply {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    }

    let dst_pixels = dst_image.into_vec();
    match pixel_type {
        PixelType::U8x3 => {
            let rgb_image = RgbImage::from_raw(dst_width, dst_height, dst_pixels)
                .ok_or("failed to create rgb image from resized data")?;
            Ok(DynamicImage::ImageRgb8(rgb_image))
        }
        PixelType::U8x4 => {
            let rgba_image = RgbaImage::from_raw(dst_width, dst_height, dst_pixels)
                .ok_or("failed to create rgba image from resized data")?;
            Ok(DynamicImage::ImageRgba8(rgba_image))
        }
        _ => Err("unsupported pixel type after resize".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RelativeRegion;
    use crate::request::Size;
    use image::{GenericImageView, Rgb};

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn create_test_image_rgba(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, ((x + y) % 256) as u8])
        }))
    }

    mod orient_tests {
        use super::*;

        #[test]
        fn test_rotate270_turns_clockwise() {
            let img = create_test_image(30, 20);
            let out = orient(img.clone(), Orientation::Rotate270);
            assert_eq!(out.dimensions(), (20, 30));
            // Bottom-left source pixel lands top-left after a clockwise quarter turn.
            assert_eq!(out.get_pixel(0, 0), img.get_pixel(0, 19));
        }

        #[test]
        fn test_rotate90_turns_counter_clockwise() {
            let img = create_test_image(30, 20);
            let out = orient(img.clone(), Orientation::Rotate90);
            assert_eq!(out.dimensions(), (20, 30));
            assert_eq!(out.get_pixel(0, 0), img.get_pixel(29, 0));
        }

        #[test]
        fn test_flips_keep_dimensions() {
            let img = create_test_image(30, 20);
            let v = orient(img.clone(), Orientation::FlipVertical);
            assert_eq!(v.get_pixel(0, 0), img.get_pixel(0, 19));
            let h = orient(img.clone(), Orientation::FlipHorizontal);
            assert_eq!(h.get_pixel(0, 0), img.get_pixel(29, 0));
        }

        #[test]
        fn test_composed_orientations_swap_axes() {
            let img = create_test_image(30, 20);
            for o in [
                Orientation::FlipVerticalRotate270,
                Orientation::FlipHorizontalRotate270,
            ] {
                assert_eq!(orient(img.clone(), o).dimensions(), (20, 30));
            }
        }
    }

    mod crop_tests {
        use super::*;

        #[test]
        fn test_square_is_centered() {
            let img = create_test_image(300, 200);
            let out = crop(img.clone(), &Region::Square);
            assert_eq!(out.dimensions(), (200, 200));
            assert_eq!(out.get_pixel(0, 0), img.get_pixel(50, 0));
        }

        #[test]
        fn test_square_odd_side_on_even_extent() {
            let img = create_test_image(300, 201);
            let out = crop(img.clone(), &Region::Square);
            assert_eq!(out.dimensions(), (201, 201));
            assert_eq!(out.get_pixel(0, 0), img.get_pixel(50, 0));

            let tall = create_test_image(201, 300);
            let out = crop(tall.clone(), &Region::Square);
            assert_eq!(out.get_pixel(0, 0), tall.get_pixel(0, 50));
        }

        #[test]
        fn test_absolute_is_clipped_to_bounds() {
            let img = create_test_image(100, 100);
            let out = crop(img.clone(), &Region::Absolute(Rect::new(-10, -10, 90, 90)));
            assert_eq!(out.dimensions(), (90, 90));
            assert_eq!(out.get_pixel(0, 0), img.get_pixel(0, 0));
        }

        #[test]
        fn test_absolute_anchored_at_top_left() {
            let img = create_test_image(100, 100);
            let out = crop(img.clone(), &Region::Absolute(Rect::new(10, 20, 40, 60)));
            assert_eq!(out.dimensions(), (30, 40));
            assert_eq!(out.get_pixel(0, 0), img.get_pixel(10, 20));
        }

        #[test]
        fn test_absolute_outside_is_empty() {
            let img = create_test_image(100, 100);
            let out = crop(img, &Region::Absolute(Rect::new(200, 200, 300, 300)));
            assert_eq!(out.dimensions(), (0, 0));
        }

        #[test]
        fn test_relative() {
            let img = create_test_image(200, 100);
            let region = RelativeRegion::new(0.25, 0.5, 0.5, 0.5).unwrap();
            let out = crop(img.clone(), &Region::Relative(region));
            assert_eq!(out.dimensions(), (100, 50));
            assert_eq!(out.get_pixel(0, 0), img.get_pixel(50, 50));
        }
    }

    mod scale_tests {
        use super::*;

        #[test]
        fn test_same_size_is_noop() {
            let img = create_test_image(64, 32);
            let out = scale(img, Dimensions::new(64, 32)).unwrap();
            assert!(matches!(out, DynamicImage::ImageRgb8(_)));
            assert_eq!(out.dimensions(), (64, 32));
        }

        #[test]
        fn test_downscale_rgb() {
            let out = scale(create_test_image(200, 100), Dimensions::new(100, 50)).unwrap();
            assert_eq!(out.dimensions(), (100, 50));
        }

        #[test]
        fn test_upscale_rgba() {
            let out = scale(create_test_image_rgba(50, 50), Dimensions::new(120, 80)).unwrap();
            assert_eq!(out.dimensions(), (120, 80));
            assert!(matches!(out, DynamicImage::ImageRgba8(_)));
        }

        #[test]
        fn test_zero_axis_yields_empty_image() {
            let out = scale(create_test_image(200, 100), Dimensions::new(0, 50)).unwrap();
            assert_eq!(out.width(), 0);
        }

        #[test]
        fn test_other_pixel_types_are_normalized() {
            let gray = DynamicImage::ImageLuma8(image::GrayImage::new(40, 40));
            let out = scale(gray, Dimensions::new(20, 20)).unwrap();
            assert_eq!(out.dimensions(), (20, 20));
            assert!(matches!(out, DynamicImage::ImageRgba8(_)));
        }

        #[test]
        fn test_image_crate_fallback_resizes_rgb() {
            let pixels: Vec<u8> = (0..10 * 10 * 3).map(|i| (i % 251) as u8).collect();
            let out = resize_with_image_crate(pixels, 10, 10, PixelType::U8x3, 5, 5).unwrap();
            assert_eq!(out.dimensions(), (5, 5));
        }
    }

    mod apply_ops_tests {
        use super::*;

        #[test]
        fn test_fixed_order_pipeline() {
            let img = create_test_image(300, 200);
            let ops = [
                Operation::Orient(Orientation::Rotate270),
                Operation::Crop(Region::Square),
                Operation::Scale(Size::Absolute {
                    width: Some(100),
                    height: Some(100),
                    best_fit: false,
                    do_not_enlarge: false,
                }),
            ];
            let out = apply_ops(img, &ops, &Limits::default()).unwrap();
            assert_eq!(out.dimensions(), (100, 100));
        }

        #[test]
        fn test_scale_over_cap_is_rejected() {
            let limits = Limits::default().with_max_scale_size(Dimensions::new(100, 200));
            let ops = [Operation::Scale(Size::Absolute {
                width: Some(300),
                height: Some(400),
                best_fit: false,
                do_not_enlarge: false,
            })];
            let err = apply_ops(create_test_image(10, 10), &ops, &limits).unwrap_err();
            assert!(matches!(err, IiifError::DimensionExceeded { .. }));
        }

        #[test]
        fn test_scale_sees_cropped_bounds() {
            let ops = [
                Operation::Crop(Region::Absolute(Rect::new(0, 0, 50, 100))),
                Operation::Scale(Size::Relative(0.5)),
            ];
            let out = apply_ops(create_test_image(400, 400), &ops, &Limits::default()).unwrap();
            assert_eq!(out.dimensions(), (25, 50));
        }
    }
}
