//! Gallery matching and pairwise descriptor comparison.

use crate::types::{euclidean_distance, ComparisonResult, Descriptor, GalleryEntry, MatchResult};

/// Maximum Euclidean distance at which a gallery candidate is accepted.
pub const GALLERY_THRESHOLD: f32 = 50.0;

/// Maximum Euclidean distance at which a direct pairwise comparison is a
/// match. Deliberately tighter than the gallery threshold: the two call
/// sites tolerate different false-accept rates.
pub const PAIR_THRESHOLD: f32 = 30.0;

/// How many nearest candidates to log during a gallery scan.
const RANKED_LOG_COUNT: usize = 5;

/// Strategy for matching a probe descriptor against enrolled gallery entries.
pub trait Matcher {
    fn best_match(
        &self,
        probe: &Descriptor,
        gallery: &[GalleryEntry],
        threshold: f32,
    ) -> MatchResult;
}

/// Nearest-neighbor Euclidean matcher.
///
/// Tracks the minimum distance with strict less-than, so the first candidate
/// achieving the global minimum wins exact ties. Candidates with a malformed
/// descriptor are skipped, never fatal.
pub struct NearestMatcher;

impl Matcher for NearestMatcher {
    fn best_match(
        &self,
        probe: &Descriptor,
        gallery: &[GalleryEntry],
        threshold: f32,
    ) -> MatchResult {
        let usable: Vec<&GalleryEntry> = gallery
            .iter()
            .filter(|entry| entry.embedding.as_ref().is_some_and(|d| !d.is_empty()))
            .collect();

        if usable.is_empty() {
            return MatchResult::rejection("no gallery descriptors supplied", None);
        }

        tracing::debug!(candidates = usable.len(), "scanning gallery");

        let mut best: Option<(&GalleryEntry, f32)> = None;
        let mut ranked: Vec<(&str, f32)> = Vec::new();

        for entry in usable {
            let Some(descriptor) = entry.embedding.as_ref() else {
                continue;
            };
            if descriptor.len() != probe.len() {
                tracing::warn!(
                    id = %entry.id,
                    len = descriptor.len(),
                    expected = probe.len(),
                    "skipping candidate with malformed descriptor"
                );
                continue;
            }
            let distance = probe.euclidean_distance(descriptor);
            if !distance.is_finite() {
                tracing::warn!(id = %entry.id, "skipping candidate with non-numeric descriptor");
                continue;
            }

            ranked.push((entry.name.as_str(), distance));
            let replaces = match best {
                None => true,
                Some((_, best_distance)) => distance < best_distance,
            };
            if replaces {
                best = Some((entry, distance));
            }
        }

        log_ranked(&mut ranked);

        match best {
            Some((entry, distance)) if distance <= threshold => {
                let similarity = similarity(distance, threshold);
                tracing::info!(
                    id = %entry.id,
                    name = %entry.name,
                    distance,
                    similarity,
                    "gallery match found"
                );
                MatchResult {
                    success: true,
                    student_id: Some(entry.id.clone()),
                    student_name: Some(entry.name.clone()),
                    stage: entry.stage.clone(),
                    distance: Some(distance),
                    similarity,
                    message: format!("match found: {}", entry.name),
                }
            }
            Some((_, distance)) => MatchResult::rejection(
                format!("no matching entry (best distance: {distance:.3})"),
                Some(distance),
            ),
            None => MatchResult::rejection("no matching entry (best distance: N/A)", None),
        }
    }
}

/// Compare two raw descriptor vectors directly, independent of any gallery.
///
/// Arbitrary equal lengths are tolerated; mismatched lengths yield the
/// error-shaped result with no distance.
pub fn compare(first: &[f32], second: &[f32], threshold: f32) -> ComparisonResult {
    if first.len() != second.len() {
        tracing::warn!(
            first = first.len(),
            second = second.len(),
            "descriptor arity mismatch"
        );
        return ComparisonResult {
            distance: None,
            similarity: 0.0,
            matched: false,
        };
    }

    let distance = euclidean_distance(first, second);
    if !distance.is_finite() {
        tracing::warn!("non-numeric descriptor values in comparison");
        return ComparisonResult {
            distance: None,
            similarity: 0.0,
            matched: false,
        };
    }

    ComparisonResult {
        distance: Some(distance),
        similarity: similarity(distance, threshold),
        matched: distance <= threshold,
    }
}

/// Normalized inverse of distance, in [0, 1], for human-facing reporting.
fn similarity(distance: f32, threshold: f32) -> f32 {
    (1.0 - distance / threshold).clamp(0.0, 1.0)
}

fn log_ranked(ranked: &mut [(&str, f32)]) {
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    for (name, distance) in ranked.iter().take(RANKED_LOG_COUNT) {
        tracing::debug!(name = %name, distance = %distance, "ranked candidate");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DESCRIPTOR_LEN;

    fn entry(id: &str, name: &str, values: Vec<f32>) -> GalleryEntry {
        GalleryEntry {
            id: id.into(),
            name: name.into(),
            stage: Some("first".into()),
            embedding: Some(Descriptor::new(values)),
        }
    }

    /// A descriptor at the given Euclidean distance from the zero vector.
    fn at_distance(distance: f32) -> Vec<f32> {
        let mut values = vec![0.0; DESCRIPTOR_LEN];
        values[0] = distance;
        values
    }

    #[test]
    fn test_empty_gallery_is_distinct_failure() {
        let probe = Descriptor::zeroed();
        let result = NearestMatcher.best_match(&probe, &[], GALLERY_THRESHOLD);
        assert!(!result.success);
        assert!(result.distance.is_none());
        assert_eq!(result.similarity, 0.0);
        assert!(result.message.contains("no gallery"));
    }

    #[test]
    fn test_entries_without_descriptors_count_as_empty_gallery() {
        let probe = Descriptor::zeroed();
        let gallery = vec![GalleryEntry {
            id: "s1".into(),
            name: "Aya".into(),
            stage: None,
            embedding: None,
        }];
        let result = NearestMatcher.best_match(&probe, &gallery, GALLERY_THRESHOLD);
        assert!(!result.success);
        assert!(result.message.contains("no gallery"));
    }

    #[test]
    fn test_nearest_candidate_wins() {
        // Distances 10 and 40, both under the threshold.
        let probe = Descriptor::zeroed();
        let gallery = vec![
            entry("s1", "Far", at_distance(40.0)),
            entry("s2", "Near", at_distance(10.0)),
        ];
        let result = NearestMatcher.best_match(&probe, &gallery, GALLERY_THRESHOLD);
        assert!(result.success);
        assert_eq!(result.student_id.as_deref(), Some("s2"));
        assert_eq!(result.student_name.as_deref(), Some("Near"));
        assert_eq!(result.stage.as_deref(), Some("first"));
        assert!((result.similarity - 0.8).abs() < 1e-6);
        assert!((result.distance.unwrap() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_exact_tie_keeps_first_candidate() {
        let probe = Descriptor::zeroed();
        let gallery = vec![
            entry("s1", "First", at_distance(25.0)),
            entry("s2", "Second", at_distance(25.0)),
        ];
        let result = NearestMatcher.best_match(&probe, &gallery, GALLERY_THRESHOLD);
        assert!(result.success);
        assert_eq!(result.student_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_threshold_boundary_accepts_exact() {
        let probe = Descriptor::zeroed();
        let gallery = vec![entry("s1", "Edge", at_distance(50.0))];
        let result = NearestMatcher.best_match(&probe, &gallery, GALLERY_THRESHOLD);
        assert!(result.success);
        assert_eq!(result.similarity, 0.0);
    }

    #[test]
    fn test_threshold_boundary_rejects_just_above() {
        let probe = Descriptor::zeroed();
        let gallery = vec![entry("s1", "Over", at_distance(50.0001))];
        let result = NearestMatcher.best_match(&probe, &gallery, GALLERY_THRESHOLD);
        assert!(!result.success);
        assert_eq!(result.similarity, 0.0);
        assert!(result.distance.unwrap() > 50.0);
    }

    #[test]
    fn test_uniform_five_gallery_candidate_rejected() {
        // All-zero probe vs. all-5.0 candidate: 5 * sqrt(128) ~ 56.57 > 50.
        let probe = Descriptor::zeroed();
        let gallery = vec![entry("s1", "Uniform", vec![5.0; DESCRIPTOR_LEN])];
        let result = NearestMatcher.best_match(&probe, &gallery, GALLERY_THRESHOLD);
        assert!(!result.success);
        assert_eq!(result.similarity, 0.0);
        let expected = 5.0 * (DESCRIPTOR_LEN as f32).sqrt();
        assert!((result.distance.unwrap() - expected).abs() < 1e-3);
    }

    #[test]
    fn test_malformed_candidate_skipped_not_fatal() {
        let probe = Descriptor::zeroed();
        let gallery = vec![
            entry("bad", "Wrong Arity", vec![1.0; 64]),
            entry("good", "Valid", at_distance(20.0)),
        ];
        let result = NearestMatcher.best_match(&probe, &gallery, GALLERY_THRESHOLD);
        assert!(result.success);
        assert_eq!(result.student_id.as_deref(), Some("good"));
    }

    #[test]
    fn test_all_candidates_malformed_rejects_without_distance() {
        let probe = Descriptor::zeroed();
        let gallery = vec![entry("bad", "Wrong Arity", vec![1.0; 64])];
        let result = NearestMatcher.best_match(&probe, &gallery, GALLERY_THRESHOLD);
        assert!(!result.success);
        assert!(result.distance.is_none());
        assert!(result.message.contains("N/A"));
    }

    #[test]
    fn test_non_finite_candidate_skipped() {
        let probe = Descriptor::zeroed();
        let mut poisoned = vec![0.0; DESCRIPTOR_LEN];
        poisoned[7] = f32::NAN;
        let gallery = vec![
            entry("nan", "Poisoned", poisoned),
            entry("ok", "Valid", at_distance(30.0)),
        ];
        let result = NearestMatcher.best_match(&probe, &gallery, GALLERY_THRESHOLD);
        assert!(result.success);
        assert_eq!(result.student_id.as_deref(), Some("ok"));
    }

    #[test]
    fn test_compare_identical_descriptors() {
        let zeros = vec![0.0; DESCRIPTOR_LEN];
        let result = compare(&zeros, &zeros, PAIR_THRESHOLD);
        assert_eq!(result.distance, Some(0.0));
        assert_eq!(result.similarity, 1.0);
        assert!(result.matched);
    }

    #[test]
    fn test_compare_is_idempotent() {
        let a: Vec<f32> = (0..DESCRIPTOR_LEN).map(|i| (i as f32) * 0.03).collect();
        let b: Vec<f32> = (0..DESCRIPTOR_LEN).map(|i| (i as f32) * -0.01).collect();
        let first = compare(&a, &b, PAIR_THRESHOLD);
        let second = compare(&a, &b, PAIR_THRESHOLD);
        assert_eq!(first.distance, second.distance);
        assert_eq!(first.similarity, second.similarity);
        assert_eq!(first.matched, second.matched);
    }

    #[test]
    fn test_compare_pair_threshold_boundary() {
        let a = vec![0.0; 4];
        let b = vec![30.0, 0.0, 0.0, 0.0];
        let result = compare(&a, &b, PAIR_THRESHOLD);
        assert!(result.matched);
        assert_eq!(result.similarity, 0.0);

        let c = vec![30.5, 0.0, 0.0, 0.0];
        let result = compare(&a, &c, PAIR_THRESHOLD);
        assert!(!result.matched);
    }

    #[test]
    fn test_compare_length_mismatch_is_error_shaped() {
        let result = compare(&[1.0, 2.0], &[1.0, 2.0, 3.0], PAIR_THRESHOLD);
        assert!(result.distance.is_none());
        assert_eq!(result.similarity, 0.0);
        assert!(!result.matched);
    }

    #[test]
    fn test_compare_tolerates_arbitrary_length() {
        let a = vec![1.0, 1.0, 1.0];
        let b = vec![1.0, 1.0, 2.0];
        let result = compare(&a, &b, PAIR_THRESHOLD);
        assert_eq!(result.distance, Some(1.0));
        assert!(result.matched);
    }
}
