//! facetag-core — Face enrollment and identification engine.
//!
//! Uses SCRFD for face detection and FaceNet for face embeddings, both
//! running via ONNX Runtime on the CPU. Known people are enrolled from a
//! directory of labeled photos and matched by Euclidean distance.

pub mod builder;
pub mod crop;
pub mod detector;
pub mod embedder;
pub mod enrollment;
pub mod matcher;
pub mod recognize;
pub mod types;

use std::path::PathBuf;

pub use builder::{EnrollError, EnrollmentBuilder, EnrollmentReport, SkipReason, SkippedImage};
pub use detector::{Detector, DetectorError, FaceDetector};
pub use embedder::{Embedder, EmbedderError, EmbedderOptions, FaceEmbedder, TensorLayout};
pub use enrollment::{Enrollment, EnrollmentError};
pub use matcher::{identify, EuclideanMatcher, MatchResult, Matcher, DEFAULT_THRESHOLD, UNKNOWN_LABEL};
pub use recognize::{label_faces, LabeledFace};
pub use types::{BoundingBox, ChannelOrder, Embedding};

/// Default location of the ONNX model files: `$XDG_DATA_HOME/facetag/models`,
/// falling back to `~/.local/share/facetag/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facetag")
        .join("models")
}
