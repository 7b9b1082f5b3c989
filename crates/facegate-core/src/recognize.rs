//! Recognize every face in one image against the gallery.

use crate::analyzer::{AnalyzeError, FaceEncoder};
use crate::annotate;
use crate::gallery::Gallery;
use crate::types::{BoundingBox, DistanceMatcher, Identity, MatchResult, Matcher, Tolerance};
use image::RgbImage;

/// Match outcome for a single face.
#[derive(Debug, Clone)]
pub struct FaceOutcome {
    pub bbox: BoundingBox,
    pub result: MatchResult,
}

/// What the kiosk displays for one picture or frame.
#[derive(Debug, Clone)]
pub struct Recognition {
    /// Input image with every face outlined.
    pub annotated: RgbImage,
    /// Closest known face in the image, or `Unknown`.
    pub identity: Identity,
    /// Face distance of `identity`, when known.
    pub distance: Option<f32>,
    pub faces: Vec<FaceOutcome>,
}

impl Recognition {
    pub fn is_match(&self) -> bool {
        self.identity.is_known()
    }
}

/// Detect, embed and match all faces in `image`.
pub fn recognize<E: FaceEncoder + ?Sized>(
    encoder: &mut E,
    image: &RgbImage,
    gallery: &Gallery,
    tolerance: Tolerance,
) -> Result<Recognition, AnalyzeError> {
    let encoded = encoder.encode(image)?;
    let mut annotated = image.clone();
    let mut faces = Vec::with_capacity(encoded.len());
    let mut best: Option<(Identity, f32)> = None;

    for face in encoded {
        let result = DistanceMatcher.compare(&face.embedding, gallery.entries(), tolerance);

        let shown_distance = result.matched.then_some(result.distance);
        annotate::draw_face(&mut annotated, &face.bbox, shown_distance);

        if let Some(identity) = result.identity.as_ref() {
            if best.as_ref().map_or(true, |(_, d)| result.distance < *d) {
                best = Some((identity.clone(), result.distance));
            }
        }

        faces.push(FaceOutcome { bbox: face.bbox, result });
    }

    tracing::debug!(
        faces = faces.len(),
        identity = best.as_ref().map(|(i, _)| i.name.as_str()).unwrap_or(Identity::UNKNOWN),
        "recognized"
    );

    let (identity, distance) = match best {
        Some((identity, distance)) => (identity, Some(distance)),
        None => (Identity::unknown(), None),
    };

    Ok(Recognition { annotated, identity, distance, faces })
}
