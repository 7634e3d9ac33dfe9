//! Image payload decoding and normalization.
//!
//! Turns an encoded payload (raw image bytes, or base64 text as sent by a
//! browser capture, optionally carrying a `data:<media-type>;base64,` marker)
//! into a canonical 8-bit RGB pixel grid, downscaled to a bounded width.

use base64::Engine;
use image::imageops::FilterType;
use image::RgbImage;
use thiserror::Error;

/// Maximum input width for enrollment and verification requests.
pub const MAX_WIDTH_RECOGNITION: u32 = 1000;
/// Maximum input width for the detection-only check.
pub const MAX_WIDTH_DETECTION: u32 = 800;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unreadable image payload: {0}")]
    Image(#[from] image::ImageError),
    #[error("decoded image has no pixels")]
    EmptyImage,
}

/// Decode a base64 image payload, stripping an optional media-type marker.
///
/// Browser captures arrive as `data:image/jpeg;base64,<payload>`; everything
/// through the first comma is the marker and is discarded.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let encoded = payload
        .split_once(',')
        .map_or(payload, |(_marker, rest)| rest);
    Ok(base64::prelude::BASE64_STANDARD.decode(encoded)?)
}

/// Decode encoded image bytes into canonical RGB, reducing 4-channel inputs
/// to 3 channels and downscaling anything wider than `max_width` while
/// preserving aspect ratio.
///
/// Descriptors are computed post-downscale, so the cap bounds work per
/// request and keeps detector behavior consistent across input resolutions.
pub fn decode_image(bytes: &[u8], max_width: u32) -> Result<RgbImage, DecodeError> {
    let decoded = image::load_from_memory(bytes)?;
    let mut rgb = decoded.to_rgb8();

    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(DecodeError::EmptyImage);
    }

    if rgb.width() > max_width {
        let scale = max_width as f32 / rgb.width() as f32;
        let new_height = ((rgb.height() as f32 * scale) as u32).max(1);
        tracing::debug!(
            from_width = rgb.width(),
            from_height = rgb.height(),
            to_width = max_width,
            to_height = new_height,
            "downscaling oversized input"
        );
        rgb = image::imageops::resize(&rgb, max_width, new_height, FilterType::Triangle);
    }

    Ok(rgb)
}
