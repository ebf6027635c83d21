//! BT.709 luma conversion.
//!
//! The output is stored as `f32` on a 0..=255 scale. 8-bit and 16-bit sources
//! are converted without an intermediate 8-bit step, so the convolution stage
//! works on unquantized luma.

use crate::error::{BlurError, Result};
use image::{DynamicImage, ImageBuffer, Luma};

/// Single-channel floating point image.
pub type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

pub const RED_WEIGHT: f32 = 0.2126;
pub const GREEN_WEIGHT: f32 = 0.7152;
pub const BLUE_WEIGHT: f32 = 0.0722;

/// 16-bit to 8-bit scale (65535 / 255).
const U16_SCALE: f32 = 257.0;

#[inline]
fn luma(r: f32, g: f32, b: f32) -> f32 {
    RED_WEIGHT * r + GREEN_WEIGHT * g + BLUE_WEIGHT * b
}

/// Allocates room for `count` samples, reporting failure instead of aborting.
pub(crate) fn alloc_samples<T>(count: usize, what: &str) -> Result<Vec<T>> {
    let mut samples = Vec::new();
    samples.try_reserve_exact(count).map_err(|e| {
        BlurError::ImageProcessing(format!("failed to allocate {} {} samples: {}", count, what, e))
    })?;
    Ok(samples)
}

fn check_dimensions(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(BlurError::InvalidImage(format!(
            "image has zero dimension ({}x{})",
            width, height
        )));
    }
    Ok(width as usize * height as usize)
}

fn collect_luma<I>(width: u32, height: u32, samples: I) -> Result<GrayF32>
where
    I: Iterator<Item = f32>,
{
    let mut buffer = alloc_samples(width as usize * height as usize, "luma")?;
    buffer.extend(samples);
    ImageBuffer::from_raw(width, height, buffer).ok_or_else(|| {
        BlurError::ImageProcessing("luma buffer does not match image dimensions".to_string())
    })
}

/// Converts an interleaved 8-bit buffer to luma.
///
/// `channels` must be 1 (already luma), 3 (RGB) or 4 (RGBA, alpha ignored),
/// and `data` must hold exactly `width * height * channels` bytes.
pub fn luma_from_raw(width: u32, height: u32, channels: u8, data: &[u8]) -> Result<GrayF32> {
    let pixel_count = check_dimensions(width, height)?;
    if !matches!(channels, 1 | 3 | 4) {
        return Err(BlurError::InvalidImage(format!(
            "unsupported channel count {}",
            channels
        )));
    }

    let expected = pixel_count * channels as usize;
    if data.len() != expected {
        return Err(BlurError::InvalidImage(format!(
            "buffer holds {} bytes, expected {} for {}x{}x{}",
            data.len(),
            expected,
            width,
            height,
            channels
        )));
    }

    match channels {
        1 => collect_luma(width, height, data.iter().map(|&v| v as f32)),
        _ => collect_luma(
            width,
            height,
            data.chunks_exact(channels as usize)
                .map(|px| luma(px[0] as f32, px[1] as f32, px[2] as f32)),
        ),
    }
}

/// Converts a decoded image to luma.
///
/// Gray images keep their single channel; 16-bit samples are rescaled to the
/// 0..=255 range. 8-bit color goes through [`luma_from_raw`]; deeper color
/// is weighted from its floating point RGB.
pub fn luma_from_image(img: &DynamicImage) -> Result<GrayF32> {
    let (width, height) = (img.width(), img.height());
    match img {
        DynamicImage::ImageLuma8(gray) => luma_from_raw(width, height, 1, gray.as_raw()),
        DynamicImage::ImageRgb8(rgb) => luma_from_raw(width, height, 3, rgb.as_raw()),
        DynamicImage::ImageRgba8(rgba) => luma_from_raw(width, height, 4, rgba.as_raw()),
        DynamicImage::ImageLumaA8(gray) => {
            check_dimensions(width, height)?;
            collect_luma(width, height, gray.pixels().map(|px| px[0] as f32))
        }
        DynamicImage::ImageLuma16(gray) => {
            check_dimensions(width, height)?;
            collect_luma(width, height, gray.pixels().map(|px| px[0] as f32 / U16_SCALE))
        }
        DynamicImage::ImageLumaA16(gray) => {
            check_dimensions(width, height)?;
            collect_luma(width, height, gray.pixels().map(|px| px[0] as f32 / U16_SCALE))
        }
        _ => {
            check_dimensions(width, height)?;
            let rgb = img.to_rgb32f();
            collect_luma(
                width,
                height,
                rgb.pixels()
                    .map(|px| luma(px[0], px[1], px[2]) * 255.0),
            )
        }
    }
}
