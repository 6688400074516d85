// src/engine/trim.rs
//
// Border trimming.
//
// The reference color is the top-left pixel. The horizontal and vertical
// scans run independently against the untrimmed image and are not refined
// against each other, so corners may keep notches of border color.

use image::{DynamicImage, GenericImageView};

/// Crops away a uniform border whose colors are within `fuzz` of the
/// top-left pixel. Returns the image unchanged when nothing is trimmed.
pub fn trim(img: DynamicImage, fuzz: f64) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img;
    }

    let reference = rgb16_at(&img, 0, 0);
    let near = |x: u32, y: u32| color_distance(reference, rgb16_at(&img, x, y)) <= fuzz;

    let mut xdepth = 0;
    while xdepth < width / 2 {
        let right = width - xdepth - 1;
        if !(0..height).all(|y| near(xdepth, y) && near(right, y)) {
            break;
        }
        xdepth += 1;
    }

    let mut ydepth = 0;
    while ydepth < height / 2 {
        let bottom = height - ydepth - 1;
        if !(0..width).all(|x| near(x, ydepth) && near(x, bottom)) {
            break;
        }
        ydepth += 1;
    }

    if xdepth == 0 && ydepth == 0 {
        return img;
    }
    tracing::debug!(xdepth, ydepth, width, height, "trimming border");
    img.crop_imm(xdepth, ydepth, width - 2 * xdepth, height - 2 * ydepth)
}

/// Normalized Euclidean distance between two 16-bit RGB colors, in [0, 1].
pub fn color_distance(a: [u16; 3], b: [u16; 3]) -> f64 {
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&p, &q)| {
            let d = p as f64 - q as f64;
            d * d
        })
        .sum();
    let max = 3.0 * 65535.0 * 65535.0_f64;
    (sum / max).sqrt()
}

/// RGB at (x, y) widened to 16 bits per channel; alpha is ignored.
fn rgb16_at(img: &DynamicImage, x: u32, y: u32) -> [u16; 3] {
    match img {
        DynamicImage::ImageRgb16(buf) => buf.get_pixel(x, y).0,
        DynamicImage::ImageRgba16(buf) => {
            let [r, g, b, _] = buf.get_pixel(x, y).0;
            [r, g, b]
        }
        DynamicImage::ImageLuma16(buf) => {
            let [l] = buf.get_pixel(x, y).0;
            [l, l, l]
        }
        DynamicImage::ImageLumaA16(buf) => {
            let [l, _] = buf.get_pixel(x, y).0;
            [l, l, l]
        }
        other => {
            let [r, g, b, _] = other.get_pixel(x, y).0;
            [widen(r), widen(g), widen(b)]
        }
    }
}

#[inline]
fn widen(v: u8) -> u16 {
    v as u16 * 257
}
