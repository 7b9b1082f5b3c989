//! facegate-core: face detection, recognition and the enrolled gallery.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings, both
//! running via ONNX Runtime on the CPU. [`recognize`] matches every face in
//! an image against the gallery; [`build_dataset`] turns the dataset
//! directory into a gallery.

pub mod alignment;
pub mod analyzer;
pub mod annotate;
pub mod dataset;
pub mod detector;
pub mod gallery;
pub mod recognize;
pub mod recognizer;
pub mod types;

use std::path::PathBuf;

pub use analyzer::{AnalyzeError, EncodedFace, FaceAnalyzer, FaceEncoder};
pub use dataset::{build_dataset, enroll_image, remove_identity, BuildReport, DatasetError};
pub use gallery::{Gallery, GalleryEntry, GalleryError};
pub use recognize::{recognize, FaceOutcome, Recognition};
pub use types::{BoundingBox, DistanceMatcher, Embedding, Identity, MatchResult, Matcher, Tolerance, ToleranceError};

/// Default ONNX model directory: `$XDG_DATA_HOME/facegate/models`,
/// falling back to `~/.local/share/facegate/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegate/models")
}
