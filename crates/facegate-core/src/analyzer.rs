//! Detector + recognizer pair behind the [`FaceEncoder`] seam.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError, ARCFACE_MODEL_VERSION};
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// A detected face together with its embedding.
#[derive(Debug, Clone)]
pub struct EncodedFace {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}

/// Anything that can find faces in an image and embed them.
pub trait FaceEncoder {
    /// Encode every face in `image`, highest detection confidence first.
    fn encode(&mut self, image: &RgbImage) -> Result<Vec<EncodedFace>, AnalyzeError>;

    /// Model version stamped on the embeddings this encoder produces.
    fn model_version(&self) -> Option<&str> {
        None
    }
}

/// SCRFD detection followed by ArcFace embedding.
pub struct FaceAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl FaceAnalyzer {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, AnalyzeError> {
        let scrfd = model_dir.join(SCRFD_MODEL_FILE);
        let arcface = model_dir.join(ARCFACE_MODEL_FILE);

        let detector = FaceDetector::load(&scrfd.to_string_lossy())?;
        let recognizer = FaceRecognizer::load(&arcface.to_string_lossy())?;

        Ok(Self { detector, recognizer })
    }
}

impl FaceEncoder for FaceAnalyzer {
    fn encode(&mut self, image: &RgbImage) -> Result<Vec<EncodedFace>, AnalyzeError> {
        let faces = self.detector.detect(image)?;
        let mut encoded = Vec::with_capacity(faces.len());

        for bbox in faces {
            if bbox.landmarks.is_none() {
                tracing::debug!(confidence = bbox.confidence, "face without landmarks; skipping");
                continue;
            }
            let embedding = self.recognizer.extract(image, &bbox)?;
            encoded.push(EncodedFace { bbox, embedding });
        }

        Ok(encoded)
    }

    fn model_version(&self) -> Option<&str> {
        Some(ARCFACE_MODEL_VERSION)
    }
}
