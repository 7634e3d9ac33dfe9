//! Fixed-length face descriptor extraction.
//!
//! Computes seven independent feature families over a canonical 64x64 face
//! crop, concatenates them in a fixed order, then truncates or zero-pads to
//! exactly 128 values, standardizes and clips. The result is deterministic
//! for byte-identical crops.

use crate::types::{Descriptor, DESCRIPTOR_LEN};
use image::imageops::FilterType;
use image::{GrayImage, RgbImage};
use imageproc::contrast::equalize_histogram;
use imageproc::corners::{corners_fast9, Corner};
use imageproc::edges::canny;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use std::cmp::Ordering;
use thiserror::Error;

/// Canonical face crop edge length for feature computation.
pub const CROP_SIZE: u32 = 64;

/// Leading samples taken from the flattened luminance, gradient and edge maps.
const SAMPLE_COUNT: usize = 32;
const HISTOGRAM_BINS: usize = 64;
const BLOCK_SIZE: u32 = 8;
const CANNY_LOW: f32 = 30.0;
const CANNY_HIGH: f32 = 100.0;
const FAST_THRESHOLD: u8 = 20;
const MAX_KEYPOINTS: usize = 32;
const KEYPOINT_SAMPLES: usize = 8;
/// Nominal FAST-9 patch diameter reported as every keypoint's size.
const KEYPOINT_SIZE: f32 = 7.0;
/// Values appended in place of the keypoint family when detection fails.
const KEYPOINT_FALLBACK_LEN: usize = 25;
/// Below this spread the descriptor is left unscaled (degenerate flat image).
const STDDEV_FLOOR: f32 = 1e-6;
/// Standardized values are clipped to [-CLIP_LIMIT, CLIP_LIMIT].
const CLIP_LIMIT: f32 = 5.0;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("face crop has no pixels")]
    EmptyCrop,
}

/// Extract the fixed-length descriptor from a cropped face region.
pub fn extract(crop: &RgbImage) -> Result<Descriptor, FeatureError> {
    if crop.width() == 0 || crop.height() == 0 {
        return Err(FeatureError::EmptyCrop);
    }

    let resized = image::imageops::resize(crop, CROP_SIZE, CROP_SIZE, FilterType::Triangle);
    let gray = image::imageops::grayscale(&resized);
    let equalized = equalize_histogram(&gray);

    let mut features: Vec<f32> = Vec::with_capacity(320);
    features.extend(luminance_samples(&equalized));
    features.extend(intensity_histogram(&equalized));
    features.extend(gradient_samples(&equalized));
    features.extend(block_statistics(&equalized));
    features.extend(edge_samples(&equalized));
    features.extend(keypoint_summary(&equalized));
    features.extend(color_moments(&resized));

    Ok(assemble(features))
}

/// First samples of the row-major flattened equalized image, scaled to [0, 1].
fn luminance_samples(equalized: &GrayImage) -> Vec<f32> {
    equalized
        .as_raw()
        .iter()
        .take(SAMPLE_COUNT)
        .map(|&p| f32::from(p) / 255.0)
        .collect()
}

/// 64-bin intensity histogram, L2-normalized.
fn intensity_histogram(equalized: &GrayImage) -> Vec<f32> {
    let mut bins = vec![0.0f32; HISTOGRAM_BINS];
    for &p in equalized.as_raw() {
        bins[p as usize * HISTOGRAM_BINS / 256] += 1.0;
    }
    let norm = bins.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for b in bins.iter_mut() {
            *b /= norm;
        }
    }
    bins
}

/// First samples of the per-pixel gradient magnitude (3x3 Sobel pair,
/// Euclidean norm), scaled by 1/255.
fn gradient_samples(equalized: &GrayImage) -> Vec<f32> {
    let gx = horizontal_sobel(equalized);
    let gy = vertical_sobel(equalized);
    gx.as_raw()
        .iter()
        .zip(gy.as_raw().iter())
        .take(SAMPLE_COUNT)
        .map(|(&x, &y)| f32::from(x).hypot(f32::from(y)) / 255.0)
        .collect()
}

/// Mean and population standard deviation of each non-overlapping 8x8 block,
/// both scaled to [0, 1], in row-major block order.
fn block_statistics(equalized: &GrayImage) -> Vec<f32> {
    let blocks_per_axis = (CROP_SIZE / BLOCK_SIZE) as usize;
    let mut out = Vec::with_capacity(blocks_per_axis * blocks_per_axis * 2);

    for block_y in (0..CROP_SIZE).step_by(BLOCK_SIZE as usize) {
        for block_x in (0..CROP_SIZE).step_by(BLOCK_SIZE as usize) {
            let mut sum = 0.0f32;
            let mut sum_sq = 0.0f32;
            for y in block_y..block_y + BLOCK_SIZE {
                for x in block_x..block_x + BLOCK_SIZE {
                    let v = f32::from(equalized.get_pixel(x, y)[0]);
                    sum += v;
                    sum_sq += v * v;
                }
            }
            let n = (BLOCK_SIZE * BLOCK_SIZE) as f32;
            let mean = sum / n;
            let variance = (sum_sq / n - mean * mean).max(0.0);
            out.push(mean / 255.0);
            out.push(variance.sqrt() / 255.0);
        }
    }

    out
}

/// First samples of the binary edge map (fixed-threshold Canny), scaled by
/// 1/255 so each value is 0.0 or 1.0.
fn edge_samples(equalized: &GrayImage) -> Vec<f32> {
    let edges = canny(equalized, CANNY_LOW, CANNY_HIGH);
    edges
        .as_raw()
        .iter()
        .take(SAMPLE_COUNT)
        .map(|&p| f32::from(p) / 255.0)
        .collect()
}

/// Keypoint count followed by (x/64, y/64, size/100) for up to the first 8
/// keypoints. Detection failure contributes a fixed run of zeros instead.
fn keypoint_summary(equalized: &GrayImage) -> Vec<f32> {
    match detect_keypoints(equalized) {
        Some(corners) => {
            let mut out = Vec::with_capacity(1 + KEYPOINT_SAMPLES * 3);
            out.push(corners.len() as f32);
            for corner in corners.iter().take(KEYPOINT_SAMPLES) {
                out.push(corner.x as f32 / CROP_SIZE as f32);
                out.push(corner.y as f32 / CROP_SIZE as f32);
                out.push(KEYPOINT_SIZE / 100.0);
            }
            out
        }
        None => vec![0.0; KEYPOINT_FALLBACK_LEN],
    }
}

/// FAST-9 corners capped at 32, in a stable order: strongest response
/// first, position as the tie-break.
fn detect_keypoints(equalized: &GrayImage) -> Option<Vec<Corner>> {
    // FAST-9 samples a 7x7 ring around each candidate pixel.
    if equalized.width() < 7 || equalized.height() < 7 {
        return None;
    }
    let mut corners = corners_fast9(equalized, FAST_THRESHOLD);
    corners.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| (a.y, a.x).cmp(&(b.y, b.x)))
    });
    corners.truncate(MAX_KEYPOINTS);
    Some(corners)
}

/// Mean and population standard deviation of each color channel, scaled to
/// [0, 1].
fn color_moments(crop: &RgbImage) -> Vec<f32> {
    let n = (crop.width() * crop.height()) as f32;
    let mut out = Vec::with_capacity(6);
    for channel in 0..3 {
        let mut sum = 0.0f32;
        let mut sum_sq = 0.0f32;
        for pixel in crop.pixels() {
            let v = f32::from(pixel[channel]);
            sum += v;
            sum_sq += v * v;
        }
        let mean = sum / n;
        let variance = (sum_sq / n - mean * mean).max(0.0);
        out.push(mean / 255.0);
        out.push(variance.sqrt() / 255.0);
    }
    out
}

/// Truncate or zero-pad to the fixed length, z-score standardize unless the
/// spread is degenerate, and clip.
fn assemble(mut features: Vec<f32>) -> Descriptor {
    features.truncate(DESCRIPTOR_LEN);
    features.resize(DESCRIPTOR_LEN, 0.0);

    let mean = features.iter().sum::<f32>() / DESCRIPTOR_LEN as f32;
    let variance =
        features.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / DESCRIPTOR_LEN as f32;
    let stddev = variance.sqrt();

    if stddev > STDDEV_FLOOR {
        for v in features.iter_mut() {
            *v = (*v - mean) / stddev;
        }
    }
    for v in features.iter_mut() {
        *v = v.clamp(-CLIP_LIMIT, CLIP_LIMIT);
    }

    Descriptor::new(features)
}
