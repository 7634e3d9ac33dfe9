//! End-to-end operations: enroll, verify, compare and detect-only.
//!
//! Every operation is synchronous, carries no state between requests, and
//! always returns a fully-formed result object. Internal failures are
//! captured here and converted into structured results with a success flag
//! and message; no error crosses the boundary raw.

use crate::decode::{self, MAX_WIDTH_DETECTION, MAX_WIDTH_RECOGNITION};
use crate::descriptor;
use crate::locator::{self, FaceLocator, LocateError};
use crate::matcher::{self, Matcher, NearestMatcher, GALLERY_THRESHOLD, PAIR_THRESHOLD};
use crate::types::{ComparisonResult, Descriptor, GalleryEntry, MatchResult};
use serde::{Deserialize, Serialize};

/// Distance thresholds used by the matching operations.
#[derive(Debug, Clone, Copy)]
pub struct MatchSettings {
    pub gallery_threshold: f32,
    pub pair_threshold: f32,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            gallery_threshold: GALLERY_THRESHOLD,
            pair_threshold: PAIR_THRESHOLD,
        }
    }
}

/// Result of an enrollment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Descriptor>,
    pub face_count: usize,
    /// True when the embedding is the all-zero fallback produced after a
    /// feature computation failure.
    #[serde(default)]
    pub degraded: bool,
    pub message: String,
}

impl EnrollOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            embedding: None,
            face_count: 0,
            degraded: false,
            message: message.into(),
        }
    }
}

/// Result of a detection-only request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectOutcome {
    pub success: bool,
    pub face_count: usize,
    pub message: String,
}

/// The face-processing core: decode, locate, extract, match.
///
/// Holds the locator (and through it the once-loaded detector model) as a
/// capability; requests are otherwise independent of each other.
pub struct FacePipeline {
    locator: FaceLocator,
    matcher: NearestMatcher,
    settings: MatchSettings,
}

impl FacePipeline {
    pub fn new(locator: FaceLocator) -> Self {
        Self::with_settings(locator, MatchSettings::default())
    }

    pub fn with_settings(locator: FaceLocator, settings: MatchSettings) -> Self {
        Self {
            locator,
            matcher: NearestMatcher,
            settings,
        }
    }

    /// Load the detector model from a file and build the pipeline around it.
    pub fn from_model_file(path: &str) -> Result<Self, LocateError> {
        Ok(Self::new(FaceLocator::from_model_file(path)?))
    }

    /// Extract one descriptor from an encoded image, for enrollment.
    pub fn enroll(&self, image: &[u8]) -> EnrollOutcome {
        let grid = match decode::decode_image(image, MAX_WIDTH_RECOGNITION) {
            Ok(grid) => grid,
            Err(err) => {
                tracing::warn!(error = %err, "enroll: decode failed");
                return EnrollOutcome::failure(err.to_string());
            }
        };

        let Some(region) = self.locator.locate(&grid) else {
            tracing::info!("enroll: no face found");
            return EnrollOutcome::failure("no face found in the image");
        };

        let crop = match locator::crop_face(&grid, &region) {
            Ok(crop) => crop,
            Err(err) => {
                tracing::warn!(error = %err, "enroll: face extraction failed");
                return EnrollOutcome::failure("failed to extract the face region");
            }
        };

        match descriptor::extract(&crop) {
            Ok(embedding) => {
                tracing::info!(len = embedding.len(), "enroll: descriptor extracted");
                EnrollOutcome {
                    success: true,
                    embedding: Some(embedding),
                    face_count: 1,
                    degraded: false,
                    message: "face descriptor extracted".into(),
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "enroll: feature computation failed, using fallback");
                EnrollOutcome {
                    success: true,
                    embedding: Some(Descriptor::zeroed()),
                    face_count: 1,
                    degraded: true,
                    message: "feature computation failed; fallback descriptor returned".into(),
                }
            }
        }
    }

    /// Extract a live descriptor from an encoded image and search the
    /// supplied gallery for the closest match within tolerance.
    pub fn verify(&self, image: &[u8], candidates: &[GalleryEntry]) -> MatchResult {
        let grid = match decode::decode_image(image, MAX_WIDTH_RECOGNITION) {
            Ok(grid) => grid,
            Err(err) => {
                tracing::warn!(error = %err, "verify: decode failed");
                return MatchResult::rejection(err.to_string(), None);
            }
        };

        let Some(region) = self.locator.locate(&grid) else {
            tracing::info!("verify: no face found");
            return MatchResult::rejection("no face found in the image", None);
        };

        let crop = match locator::crop_face(&grid, &region) {
            Ok(crop) => crop,
            Err(err) => {
                tracing::warn!(error = %err, "verify: face extraction failed");
                return MatchResult::rejection("failed to extract the face region", None);
            }
        };

        let probe = match descriptor::extract(&crop) {
            Ok(probe) => probe,
            Err(err) => {
                tracing::warn!(error = %err, "verify: feature computation failed, using fallback");
                Descriptor::zeroed()
            }
        };

        self.matcher
            .best_match(&probe, candidates, self.settings.gallery_threshold)
    }

    /// Compare two descriptors directly, independent of any gallery.
    pub fn compare(&self, first: &[f32], second: &[f32]) -> ComparisonResult {
        matcher::compare(first, second, self.settings.pair_threshold)
    }

    /// Count faces in an encoded image without producing a descriptor.
    /// Used for liveness/UI feedback.
    pub fn detect_only(&self, image: &[u8]) -> DetectOutcome {
        let grid = match decode::decode_image(image, MAX_WIDTH_DETECTION) {
            Ok(grid) => grid,
            Err(err) => {
                tracing::warn!(error = %err, "detect: decode failed");
                return DetectOutcome {
                    success: false,
                    face_count: 0,
                    message: err.to_string(),
                };
            }
        };

        let face_count = self.locator.count_faces(&grid);
        if face_count > 0 {
            DetectOutcome {
                success: true,
                face_count,
                message: format!("detected {face_count} face(s)"),
            }
        } else {
            DetectOutcome {
                success: false,
                face_count: 0,
                message: "no face detected; check lighting and position".into(),
            }
        }
    }
}
