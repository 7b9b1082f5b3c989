use crate::gallery::GalleryEntry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Cosine similarity in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Face distance on the tolerance scale.
    ///
    /// Half the Euclidean distance, which lies in [0, 1] for L2-normalized
    /// embeddings: 0 = identical, 1 = opposite.
    pub fn face_distance(&self, other: &Embedding) -> f32 {
        self.euclidean_distance(other) * 0.5
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ToleranceError {
    #[error("tolerance must be within 0.0..=1.0, got {0}")]
    OutOfRange(f32),
    #[error("tolerance is not a number: {0}")]
    Invalid(String),
}

/// Maximum face distance accepted as a match.
///
/// Lower tolerance = stricter matching. Values are kept on a 0.01 grid.
///
/// For L2-normalized embeddings a tolerance `t` accepts exactly the pairs
/// with cosine similarity >= `1 - 2t²`: the default 0.5 means cosine >= 0.5,
/// and a cosine threshold of 0.40 corresponds to a tolerance of about 0.55.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Tolerance(f32);

impl Tolerance {
    pub const MIN: f32 = 0.0;
    pub const MAX: f32 = 1.0;
    pub const STEP: f32 = 0.01;

    pub fn new(value: f32) -> Result<Self, ToleranceError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ToleranceError::OutOfRange(value));
        }
        let snapped = (value / Self::STEP).round() * Self::STEP;
        Ok(Self(snapped.clamp(Self::MIN, Self::MAX)))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Lowest cosine similarity this tolerance accepts.
    pub fn min_cosine_similarity(self) -> f32 {
        1.0 - 2.0 * self.0 * self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(0.5)
    }
}

impl TryFrom<f32> for Tolerance {
    type Error = ToleranceError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Tolerance> for f32 {
    fn from(t: Tolerance) -> f32 {
        t.0
    }
}

impl FromStr for Tolerance {
    type Err = ToleranceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f32 = s
            .trim()
            .parse()
            .map_err(|_| ToleranceError::Invalid(s.to_string()))?;
        Self::new(value)
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Who a face belongs to. Unrecognized faces are `Unknown` / `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub id: String,
}

impl Identity {
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self { name: name.into(), id: id.into() }
    }

    pub fn unknown() -> Self {
        Self::new(Self::UNKNOWN, Self::UNKNOWN)
    }

    pub fn is_known(&self) -> bool {
        self.name != Self::UNKNOWN
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Result of matching a probe embedding against the gallery.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub matched: bool,
    /// Face distance of the nearest gallery entry, 1.0 for an empty gallery.
    pub distance: f32,
    /// Identity of the matched entry (if any).
    pub identity: Option<Identity>,
}

/// Strategy for comparing a probe embedding against the enrolled gallery.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry], tolerance: Tolerance) -> MatchResult;
}

/// Nearest-neighbour matcher over face distance.
///
/// Always visits every gallery entry, no early exit.
pub struct DistanceMatcher;

impl Matcher for DistanceMatcher {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry], tolerance: Tolerance) -> MatchResult {
        let mut best_dist = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, entry) in gallery.iter().enumerate() {
            let dist = probe.face_distance(&entry.embedding);
            if dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_dist <= tolerance.value() => MatchResult {
                matched: true,
                distance: best_dist,
                identity: Some(gallery[idx].identity()),
            },
            _ => MatchResult {
                matched: false,
                distance: if best_dist.is_finite() { best_dist } else { 1.0 },
                identity: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: &[f32]) -> Embedding {
        Embedding { values: values.to_vec(), model_version: None }
    }

    fn entry(name: &str, id: &str, values: &[f32]) -> GalleryEntry {
        GalleryEntry {
            name: name.into(),
            id: id.into(),
            source: format!("{name}_{id}.jpg"),
            source_sha256: String::new(),
            embedding: emb(values),
            created_at: String::new(),
        }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = emb(&[1.0, 0.0, 0.0]);
        assert!((a.similarity(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = emb(&[0.0, 0.0]);
        let b = emb(&[1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_face_distance_range() {
        let a = emb(&[1.0, 0.0]);
        let same = emb(&[1.0, 0.0]);
        let opposite = emb(&[-1.0, 0.0]);
        assert!(a.face_distance(&same).abs() < 1e-6);
        assert!((a.face_distance(&opposite) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tolerance_snaps_to_step() {
        let t = Tolerance::new(0.456).unwrap();
        assert!((t.value() - 0.46).abs() < 1e-6);
        assert_eq!(t.to_string(), "0.46");
    }

    #[test]
    fn test_tolerance_bounds() {
        assert!(Tolerance::new(0.0).is_ok());
        assert!(Tolerance::new(1.0).is_ok());
        assert_eq!(Tolerance::new(1.01), Err(ToleranceError::OutOfRange(1.01)));
        assert!(Tolerance::new(-0.1).is_err());
        assert!(Tolerance::new(f32::NAN).is_err());
    }

    #[test]
    fn test_tolerance_cosine_equivalence() {
        assert!((Tolerance::default().min_cosine_similarity() - 0.5).abs() < 1e-6);
        assert!((Tolerance::new(0.55).unwrap().min_cosine_similarity() - 0.395).abs() < 1e-6);
        assert!((Tolerance::new(0.0).unwrap().min_cosine_similarity() - 1.0).abs() < 1e-6);
        assert!((Tolerance::new(1.0).unwrap().min_cosine_similarity() + 1.0).abs() < 1e-6);

        // A unit pair right at the boundary matches on both scales.
        let t = Tolerance::new(0.3).unwrap();
        let cos = t.min_cosine_similarity();
        let a = emb(&[1.0, 0.0]);
        let b = emb(&[cos, (1.0 - cos * cos).sqrt()]);
        assert!((a.similarity(&b) - cos).abs() < 1e-5);
        assert!((a.face_distance(&b) - t.value()).abs() < 1e-5);
    }

    #[test]
    fn test_tolerance_parse() {
        assert_eq!("0.3".parse::<Tolerance>().unwrap(), Tolerance::new(0.3).unwrap());
        assert!(matches!("lenient".parse::<Tolerance>(), Err(ToleranceError::Invalid(_))));
        assert_eq!(Tolerance::default().value(), 0.5);
    }

    #[test]
    fn test_identity_unknown() {
        let unknown = Identity::unknown();
        assert_eq!(unknown.name, "Unknown");
        assert_eq!(unknown.id, "Unknown");
        assert!(!unknown.is_known());
        assert!(Identity::new("Ada", "17").is_known());
    }

    #[test]
    fn test_matcher_visits_whole_gallery() {
        let probe = emb(&[1.0, 0.0, 0.0]);
        let gallery = vec![
            entry("decoy", "1", &[0.0, 1.0, 0.0]),
            entry("decoy", "2", &[0.0, 0.0, 1.0]),
            entry("Ada", "3", &[1.0, 0.0, 0.0]),
        ];

        let result = DistanceMatcher.compare(&probe, &gallery, Tolerance::default());
        assert!(result.matched);
        assert_eq!(result.identity, Some(Identity::new("Ada", "3")));
        assert!(result.distance.abs() < 1e-6);
    }

    #[test]
    fn test_matcher_respects_tolerance() {
        // Orthogonal unit vectors sit at face distance sqrt(2)/2 ≈ 0.707.
        let probe = emb(&[1.0, 0.0]);
        let gallery = vec![entry("Ada", "3", &[0.0, 1.0])];

        let strict = DistanceMatcher.compare(&probe, &gallery, Tolerance::new(0.5).unwrap());
        assert!(!strict.matched);
        assert!(strict.identity.is_none());
        assert!((strict.distance - 0.7071).abs() < 1e-3);

        let lenient = DistanceMatcher.compare(&probe, &gallery, Tolerance::new(0.8).unwrap());
        assert!(lenient.matched);
    }

    #[test]
    fn test_matcher_empty_gallery() {
        let probe = emb(&[1.0, 0.0]);
        let result = DistanceMatcher.compare(&probe, &[], Tolerance::new(1.0).unwrap());
        assert!(!result.matched);
        assert_eq!(result.distance, 1.0);
    }
}
