//! Face-region localization over a decoded pixel grid.
//!
//! Runs the SeetaFace frontal cascade (a multi-scale sliding-window
//! detector) on the luminance plane, then applies the multi-face selection
//! and padding policy to yield at most one region of interest.

use crate::types::FaceRegion;
use image::{GrayImage, RgbImage};
use imageproc::contrast::equalize_histogram;
use rustface::ImageData;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

/// Padding added around a tight detection box, as a fraction of min(w, h),
/// applied to each side before clamping to image bounds.
pub const PADDING_RATIO: f32 = 0.1;

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("detector model file not found: {0}")]
    ModelNotFound(String),
    #[error("failed to read detector model: {0}")]
    ModelRead(String),
    #[error("face region clamps to zero area")]
    EmptyCrop,
}

/// Scan parameters for the multi-scale sliding-window detector.
#[derive(Debug, Clone, Copy)]
pub struct ScanParams {
    /// Image pyramid downscale step in (0, 1); closer to 1 scans more scales.
    pub pyramid_scale_factor: f32,
    /// Classifier score gate; higher rejects more marginal windows.
    pub score_thresh: f64,
    /// Sliding-window step in pixels, applied on both axes.
    pub window_step: u32,
    /// Smallest region edge considered, in pixels.
    pub min_face_size: u32,
    /// Largest region edge considered, in pixels. 0 disables the bound.
    pub max_face_size: u32,
}

impl ScanParams {
    /// Precision-tuned preset used for enrollment and verification.
    pub fn precise() -> Self {
        Self {
            pyramid_scale_factor: 0.8,
            score_thresh: 2.0,
            window_step: 4,
            min_face_size: 30,
            max_face_size: 400,
        }
    }

    /// Recall-tuned, low-latency preset used by the detection-only check.
    pub fn fast() -> Self {
        Self {
            pyramid_scale_factor: 0.7,
            score_thresh: 3.85,
            window_step: 8,
            min_face_size: 30,
            max_face_size: 0,
        }
    }
}

/// Raw detector output before selection and padding.
#[derive(Debug, Clone, Copy)]
struct Detection {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

impl Detection {
    fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Face locator holding the once-loaded cascade model.
///
/// The model is immutable for the process lifetime; a fresh detector
/// instance is created from it per call, so concurrent `&self` calls stay
/// independent.
pub struct FaceLocator {
    model: rustface::Model,
}

impl FaceLocator {
    /// Load the SeetaFace frontal model from the given path.
    pub fn from_model_file(path: &str) -> Result<Self, LocateError> {
        if !Path::new(path).exists() {
            return Err(LocateError::ModelNotFound(path.to_string()));
        }
        let bytes = std::fs::read(path).map_err(|e| LocateError::ModelRead(e.to_string()))?;
        let model = rustface::read_model(Cursor::new(bytes))
            .map_err(|e| LocateError::ModelRead(e.to_string()))?;
        tracing::info!(path, "face detector model loaded");
        Ok(Self { model })
    }

    /// Wrap an already-loaded model.
    pub fn from_model(model: rustface::Model) -> Self {
        Self { model }
    }

    /// Locate at most one face region.
    ///
    /// The luminance plane is histogram-equalized before detection to make
    /// behavior consistent across lighting conditions. When several
    /// candidate regions are found, the one with the largest area wins and
    /// the rest are discarded. The selected region is padded and clamped to
    /// the image bounds. Returns `None` when no region is found.
    pub fn locate(&self, image: &RgbImage) -> Option<FaceRegion> {
        let gray = image::imageops::grayscale(image);
        let equalized = equalize_histogram(&gray);
        let detections = self.scan(&equalized, &ScanParams::precise());
        tracing::debug!(count = detections.len(), "face candidates found");

        if detections.len() > 1 {
            tracing::warn!(
                count = detections.len(),
                "multiple faces found, keeping the largest"
            );
        }

        let primary = select_primary(&detections)?;
        Some(pad_and_clamp(&primary, image.width(), image.height()))
    }

    /// Count face regions using the recall-tuned preset, with no selection
    /// or padding. Used for the lightweight liveness/UI feedback check.
    pub fn count_faces(&self, image: &RgbImage) -> usize {
        let gray = image::imageops::grayscale(image);
        self.scan(&gray, &ScanParams::fast()).len()
    }

    fn scan(&self, gray: &GrayImage, params: &ScanParams) -> Vec<Detection> {
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(params.min_face_size);
        if params.max_face_size > 0 {
            detector.set_max_face_size(params.max_face_size);
        }
        detector.set_score_thresh(params.score_thresh);
        detector.set_pyramid_scale_factor(params.pyramid_scale_factor);
        detector.set_slide_window_step(params.window_step, params.window_step);

        let faces = detector.detect(&ImageData::new(gray.as_raw(), gray.width(), gray.height()));

        faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                Detection {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width(),
                    height: bbox.height(),
                }
            })
            .collect()
    }
}

/// Crop the padded face region out of the image.
///
/// A region that clamped to zero area is an extraction failure, distinct
/// from the no-region case.
pub fn crop_face(image: &RgbImage, region: &FaceRegion) -> Result<RgbImage, LocateError> {
    if region.is_empty() {
        return Err(LocateError::EmptyCrop);
    }
    Ok(image::imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image())
}

/// Largest-area selection; on equal areas the earlier detection wins.
fn select_primary(detections: &[Detection]) -> Option<Detection> {
    detections
        .iter()
        .copied()
        .fold(None, |best: Option<Detection>, det| match best {
            Some(b) if det.area() <= b.area() => Some(b),
            _ => Some(det),
        })
}

/// Expand a detection by `PADDING_RATIO * min(w, h)` on each side and clamp
/// the result to the image bounds.
fn pad_and_clamp(det: &Detection, image_width: u32, image_height: u32) -> FaceRegion {
    let padding = (det.width.min(det.height) as f32 * PADDING_RATIO) as i32;
    let x = (det.x - padding).max(0);
    let y = (det.y - padding).max(0);
    let width = (det.width as i32 + padding * 2)
        .min(image_width as i32 - x)
        .max(0);
    let height = (det.height as i32 + padding * 2)
        .min(image_height as i32 - y)
        .max(0);

    FaceRegion {
        x: x as u32,
        y: y as u32,
        width: width as u32,
        height: height as u32,
    }
}
