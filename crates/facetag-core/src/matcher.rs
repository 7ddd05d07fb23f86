//! Nearest-neighbor identity matching with unknown rejection.

use crate::enrollment::Enrollment;
use crate::types::Embedding;

/// Label reported for a face that matches no enrolled identity.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Default maximum Euclidean distance accepted as a match.
pub const DEFAULT_THRESHOLD: f32 = 1.0;

/// Result of matching a probe embedding against an enrollment.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Distance to the nearest enrolled embedding, `f32::INFINITY` if nothing was compared.
    pub distance: f32,
    /// Label of the matched identity (only set when `matched`).
    pub label: Option<String>,
}

impl MatchResult {
    fn unknown(distance: f32) -> Self {
        Self {
            matched: false,
            distance,
            label: None,
        }
    }

    /// The matched label, or [`UNKNOWN_LABEL`].
    pub fn name(&self) -> &str {
        self.label.as_deref().unwrap_or(UNKNOWN_LABEL)
    }
}

/// Strategy for comparing a probe embedding against enrolled faces.
pub trait Matcher {
    fn identify(&self, probe: &Embedding, enrollment: &Enrollment, threshold: f32) -> MatchResult;
}

/// Exhaustive Euclidean nearest-neighbor matcher.
///
/// Scans every enrolled embedding in insertion order. The first embedding
/// reaching the minimum distance wins ties. A minimum strictly greater than
/// `threshold` is reported as unknown, so a distance equal to the threshold
/// still matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn identify(&self, probe: &Embedding, enrollment: &Enrollment, threshold: f32) -> MatchResult {
        let mut min_dist = f32::INFINITY;
        let mut best: Option<&str> = None;

        for (label, enrolled) in enrollment.iter() {
            let dist = probe.euclidean_distance(enrolled);
            if dist < min_dist {
                min_dist = dist;
                best = Some(label);
            }
        }

        match best {
            Some(label) if min_dist <= threshold => MatchResult {
                matched: true,
                distance: min_dist,
                label: Some(label.to_string()),
            },
            _ => MatchResult::unknown(min_dist),
        }
    }
}

/// Label for `probe` using [`EuclideanMatcher`].
pub fn identify(probe: &Embedding, enrollment: &Enrollment, threshold: f32) -> String {
    EuclideanMatcher
        .identify(probe, enrollment, threshold)
        .name()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    fn two_people() -> Enrollment {
        let mut e = Enrollment::new();
        e.insert("alice", emb(&[1.0, 0.0, 0.0])).unwrap();
        e.insert("alice", emb(&[0.9, 0.1, 0.0])).unwrap();
        e.insert("bob", emb(&[0.0, 1.0, 0.0])).unwrap();
        e
    }

    #[test]
    fn test_enrolled_embedding_identifies_itself() {
        let e = two_people();
        for (label, enrolled) in e.iter() {
            let result = EuclideanMatcher.identify(enrolled, &e, f32::INFINITY);
            assert!(result.matched);
            assert_eq!(result.name(), label);
            assert_eq!(result.distance, 0.0);
        }
    }

    #[test]
    fn test_empty_enrollment_is_unknown() {
        let e = Enrollment::new();
        for threshold in [0.0, 1.0, 1e9, f32::INFINITY] {
            let result = EuclideanMatcher.identify(&emb(&[0.5, 0.5]), &e, threshold);
            assert!(!result.matched);
            assert_eq!(result.name(), UNKNOWN_LABEL);
            assert_eq!(result.distance, f32::INFINITY);
        }
    }

    #[test]
    fn test_threshold_below_distance_is_unknown() {
        let mut e = Enrollment::new();
        e.insert("alice", emb(&[0.0, 0.0])).unwrap();
        let probe = emb(&[3.0, 4.0]); // distance 5

        let result = EuclideanMatcher.identify(&probe, &e, 4.99);
        assert!(!result.matched);
        assert_eq!(result.name(), UNKNOWN_LABEL);
        assert_relative_eq!(result.distance, 5.0);
    }

    #[test]
    fn test_threshold_above_distance_matches() {
        let mut e = Enrollment::new();
        e.insert("alice", emb(&[0.0, 0.0])).unwrap();
        let probe = emb(&[3.0, 4.0]);

        let result = EuclideanMatcher.identify(&probe, &e, 5.01);
        assert!(result.matched);
        assert_eq!(result.name(), "alice");
    }

    #[test]
    fn test_distance_equal_to_threshold_matches() {
        let mut e = Enrollment::new();
        e.insert("alice", emb(&[0.0, 0.0])).unwrap();
        let probe = emb(&[3.0, 4.0]);
        let d = probe.euclidean_distance(&e.get("alice").unwrap()[0]);

        let result = EuclideanMatcher.identify(&probe, &e, d);
        assert!(result.matched);
        assert_eq!(result.name(), "alice");
    }

    #[test]
    fn test_equidistant_tie_goes_to_first_inserted() {
        let probe = emb(&[0.0, 0.0]);

        let mut ab = Enrollment::new();
        ab.insert("a", emb(&[1.0, 0.0])).unwrap();
        ab.insert("b", emb(&[0.0, 1.0])).unwrap();
        assert_eq!(identify(&probe, &ab, 2.0), "a");

        let mut ba = Enrollment::new();
        ba.insert("b", emb(&[0.0, 1.0])).unwrap();
        ba.insert("a", emb(&[1.0, 0.0])).unwrap();
        assert_eq!(identify(&probe, &ba, 2.0), "b");
    }

    #[test]
    fn test_nearest_among_many_wins() {
        let e = two_people();
        let result = EuclideanMatcher.identify(&emb(&[0.1, 0.95, 0.0]), &e, 1.0);
        assert_eq!(result.name(), "bob");
        assert!(result.distance < 0.2);
    }

    #[test]
    fn test_nan_distance_never_wins() {
        let mut e = Enrollment::new();
        e.insert("nan", emb(&[f32::NAN, 0.0])).unwrap();
        e.insert("real", emb(&[1.0, 0.0])).unwrap();

        let result = EuclideanMatcher.identify(&emb(&[1.0, 0.0]), &e, 1.0);
        assert_eq!(result.name(), "real");
    }

    #[test]
    fn test_identify_default_threshold() {
        let e = two_people();
        assert_eq!(identify(&emb(&[0.0, 1.0, 0.0]), &e, DEFAULT_THRESHOLD), "bob");
        assert_eq!(
            identify(&emb(&[0.0, 0.0, 5.0]), &e, DEFAULT_THRESHOLD),
            UNKNOWN_LABEL
        );
    }
}
