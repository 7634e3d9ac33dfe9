use serde::{Deserialize, Serialize};

/// Fixed length of every face descriptor, regardless of how many values the
/// feature families contributed.
pub const DESCRIPTOR_LEN: usize = 128;

/// Axis-aligned face region in pixel coordinates of the decoded image.
///
/// Regions returned by the locator are already padded and clamped, so they
/// are fully contained within the image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Fixed-length numeric face descriptor. Immutable once produced.
///
/// Serializes as a bare JSON array so gallery records can store it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// The deterministic all-zero fallback descriptor.
    pub fn zeroed() -> Self {
        Self {
            values: vec![0.0; DESCRIPTOR_LEN],
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute Euclidean distance to another descriptor.
    ///
    /// Both descriptors must have the same arity; callers are expected to
    /// check `len()` first.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        euclidean_distance(&self.values, other.values())
    }
}

impl From<Vec<f32>> for Descriptor {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Euclidean distance between two raw descriptor slices.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// One enrolled gallery record, supplied by the caller per verification
/// request. The core never stores or caches these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default)]
    pub embedding: Option<Descriptor>,
}

/// Result of matching a probe descriptor against a gallery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    pub similarity: f32,
    pub message: String,
}

impl MatchResult {
    /// A non-match result carrying only a status message and, when one was
    /// computed, the best distance seen.
    pub fn rejection(message: impl Into<String>, distance: Option<f32>) -> Self {
        Self {
            success: false,
            student_id: None,
            student_name: None,
            stage: None,
            distance,
            similarity: 0.0,
            message: message.into(),
        }
    }
}

/// Result of a direct two-descriptor comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    pub similarity: f32,
    #[serde(rename = "match")]
    pub matched: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_symmetric() {
        let a = Descriptor::new(vec![1.0, 2.0, 3.0]);
        let b = Descriptor::new(vec![4.0, 6.0, 3.0]);
        assert_eq!(a.euclidean_distance(&b), b.euclidean_distance(&a));
    }

    #[test]
    fn test_distance_identical_is_zero() {
        let a = Descriptor::zeroed();
        let b = Descriptor::zeroed();
        assert_eq!(a.euclidean_distance(&b), 0.0);
    }

    #[test]
    fn test_distance_three_four_five() {
        let a = Descriptor::new(vec![0.0, 0.0]);
        let b = Descriptor::new(vec![3.0, 4.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_zeroed_has_fixed_length() {
        let d = Descriptor::zeroed();
        assert_eq!(d.len(), DESCRIPTOR_LEN);
        assert!(d.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_region_area() {
        let r = FaceRegion {
            x: 10,
            y: 20,
            width: 30,
            height: 40,
        };
        assert_eq!(r.area(), 1200);
        assert!(!r.is_empty());
        let empty = FaceRegion {
            x: 0,
            y: 0,
            width: 0,
            height: 5,
        };
        assert!(empty.is_empty());
    }

    #[test]
    fn test_descriptor_serializes_as_array() {
        let d = Descriptor::new(vec![1.0, 2.0]);
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "[1.0,2.0]");
    }

    #[test]
    fn test_gallery_entry_without_embedding_deserializes() {
        let entry: GalleryEntry =
            serde_json::from_str(r#"{"id": "s1", "name": "Aya"}"#).unwrap();
        assert!(entry.embedding.is_none());
        assert!(entry.stage.is_none());
    }
}
