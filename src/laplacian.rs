//! # Laplacian Variance Sharpness
//!
//! Detects blur by measuring high-frequency content (edges). The luma image is
//! convolved with the 8-neighbour discrete Laplacian
//!
//! ```text
//! [ -1 -1 -1 ]
//! [ -1  8 -1 ]
//! [ -1 -1 -1 ]
//! ```
//!
//! and the population variance of the response is the score. A sharp image has
//! more edge energy and therefore a larger variance; a flat image scores 0.
//!
//! ## Border handling
//!
//! Pixels outside the image are replaced by the nearest edge pixel (clamped
//! coordinates). The response therefore covers all W×H pixels and a constant
//! image convolves to exactly zero everywhere.
//!
//! ## Degenerate input
//!
//! Images narrower or shorter than 3 pixels are rejected instead of padded;
//! the kernel would see nothing but replicated border.

use crate::error::{BlurError, Result};
use crate::grayscale::{alloc_samples, luma_from_image, GrayF32};
use image::DynamicImage;
use rayon::prelude::*;

pub const LAPLACIAN_KERNEL: [[f64; 3]; 3] = [
    [-1.0, -1.0, -1.0],
    [-1.0, 8.0, -1.0],
    [-1.0, -1.0, -1.0],
];

/// Smallest width/height the scorer accepts.
pub const MIN_DIMENSION: u32 = 3;

/// Calculates the sharpness of an image using the Laplacian variance method.
/// Higher values indicate sharper images.
pub fn calculate_sharpness(img: &DynamicImage) -> Result<f32> {
    let gray = luma_from_image(img)?;
    laplacian_variance(&gray)
}

/// Computes the variance of the Laplacian of a luma image.
pub fn laplacian_variance(gray: &GrayF32) -> Result<f32> {
    let response = laplacian_response(gray)?;

    // Sequential accumulation keeps the score bit-identical across runs.
    let n = response.len() as f64;
    let (sum, sum_sq) = response
        .iter()
        .fold((0.0f64, 0.0f64), |(s, sq), &v| (s + v, sq + v * v));
    let mean = sum / n;
    let variance = (sum_sq / n - mean * mean).max(0.0);

    let score = variance as f32;
    if !score.is_finite() {
        return Err(BlurError::ImageProcessing(format!(
            "laplacian variance is not finite ({})",
            variance
        )));
    }
    Ok(score)
}

/// Convolves `gray` with [`LAPLACIAN_KERNEL`] using edge replication.
///
/// Returns one response per pixel in row-major order. Rows are processed in
/// parallel.
pub fn laplacian_response(gray: &GrayF32) -> Result<Vec<f64>> {
    let (width, height) = gray.dimensions();
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(BlurError::ImageProcessing(format!(
            "image is {}x{}, laplacian needs at least {}x{}",
            width, height, MIN_DIMENSION, MIN_DIMENSION
        )));
    }

    let w = width as usize;
    let h = height as usize;
    let count = w * h;

    let mut response: Vec<f64> = alloc_samples(count, "laplacian")?;
    response.resize(count, 0.0);

    let src = gray.as_raw();
    response
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row)| {
            let rows = [y.saturating_sub(1), y, (y + 1).min(h - 1)];
            for (x, out) in row.iter_mut().enumerate() {
                let cols = [x.saturating_sub(1), x, (x + 1).min(w - 1)];
                let mut acc = 0.0f64;
                for (ky, &ry) in rows.iter().enumerate() {
                    for (kx, &cx) in cols.iter().enumerate() {
                        acc += LAPLACIAN_KERNEL[ky][kx] * src[ry * w + cx] as f64;
                    }
                }
                *out = acc;
            }
        });

    Ok(response)
}
