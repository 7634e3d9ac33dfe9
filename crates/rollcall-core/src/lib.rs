//! rollcall-core: the face-processing core of an attendance-by-face system.
//!
//! Converts a detected face region inside an image into a fixed-length
//! 128-value descriptor and decides whether that descriptor identifies a
//! known person from a gallery of enrolled descriptors, or matches a second
//! descriptor directly. Pipeline: decode, locate, extract, match. Transport,
//! session handling and gallery storage live with the callers; this crate
//! consumes and produces plain data structures.

pub mod decode;
pub mod descriptor;
pub mod locator;
pub mod matcher;
pub mod pipeline;
pub mod types;

pub use locator::FaceLocator;
pub use pipeline::{DetectOutcome, EnrollOutcome, FacePipeline, MatchSettings};
pub use types::{
    ComparisonResult, Descriptor, FaceRegion, GalleryEntry, MatchResult, DESCRIPTOR_LEN,
};
