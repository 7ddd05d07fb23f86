//! Enrollment from a directory of labeled face images.
//!
//! Layout: one subdirectory per person, named by its label, holding that
//! person's photos.
//!
//! ```text
//! Faces/
//!   Alice/  a1.jpg a2.png
//!   Bob/    b1.jpg
//! ```
//!
//! Only the first (most confident) face of each photo is enrolled.

use crate::crop::prepare_face;
use crate::detector::Detector;
use crate::embedder::Embedder;
use crate::enrollment::Enrollment;
use crate::types::Embedding;
use image::RgbImage;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("cannot read enrollment directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why an enrollment image contributed no embedding.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    ImageLoad(String),
    NoFaceDetected,
    Detector(String),
    EmptyCrop(String),
    Embedder(String),
    Rejected(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageLoad(e) => write!(f, "cannot load image: {e}"),
            Self::NoFaceDetected => write!(f, "no face detected"),
            Self::Detector(e) => write!(f, "detector failed: {e}"),
            Self::EmptyCrop(e) => write!(f, "unusable face box: {e}"),
            Self::Embedder(e) => write!(f, "embedder failed: {e}"),
            Self::Rejected(e) => write!(f, "embedding rejected: {e}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedImage {
    pub label: String,
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// What happened while building an enrollment.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentReport {
    /// Image files attempted.
    pub scanned: usize,
    pub skipped: Vec<SkippedImage>,
}

/// Builds an [`Enrollment`] by running detector and embedder over labeled photos.
pub struct EnrollmentBuilder<'a, D: ?Sized, E: ?Sized> {
    detector: &'a mut D,
    embedder: &'a mut E,
}

impl<'a, D, E> EnrollmentBuilder<'a, D, E>
where
    D: Detector + ?Sized,
    E: Embedder + ?Sized,
{
    pub fn new(detector: &'a mut D, embedder: &'a mut E) -> Self {
        Self { detector, embedder }
    }

    /// Walk `root` and enroll every face photo found in its label directories.
    ///
    /// Labels and files are visited in name order. Unusable photos are logged
    /// and listed in the report; only an unreadable `root` is an error.
    pub fn build(&mut self, root: &Path) -> Result<(Enrollment, EnrollmentReport), EnrollError> {
        let mut enrollment = Enrollment::new();
        let mut report = EnrollmentReport::default();

        let entries = sorted_entries(root).map_err(|source| EnrollError::ReadDir {
            path: root.to_path_buf(),
            source,
        })?;

        for person_dir in entries {
            if !person_dir.is_dir() {
                tracing::debug!(path = %person_dir.display(), "ignoring file outside a label directory");
                continue;
            }
            let Some(label) = person_dir.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!(path = %person_dir.display(), "label directory name is not valid UTF-8");
                continue;
            };

            let files = match sorted_entries(&person_dir) {
                Ok(files) => files,
                Err(e) => {
                    tracing::warn!(label, error = %e, "cannot read label directory");
                    continue;
                }
            };

            for path in files.into_iter().filter(|p| p.is_file()) {
                report.scanned += 1;

                let outcome = self
                    .enroll_file(&path)
                    .and_then(|embedding| {
                        enrollment
                            .insert(label, embedding)
                            .map_err(|e| SkipReason::Rejected(e.to_string()))
                    });

                if let Err(reason) = outcome {
                    match &reason {
                        SkipReason::NoFaceDetected => {
                            tracing::warn!(path = %path.display(), "No face detected in {}", path.display())
                        }
                        other => {
                            tracing::warn!(path = %path.display(), reason = %other, "skipping enrollment image")
                        }
                    }
                    report.skipped.push(SkippedImage {
                        label: label.to_string(),
                        path,
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            identities = ?enrollment.labels().collect::<Vec<_>>(),
            embeddings = enrollment.embedding_count(),
            skipped = report.skipped.len(),
            "Known faces loaded"
        );

        Ok((enrollment, report))
    }

    /// Load one photo and compute the embedding of its first face.
    pub fn enroll_file(&mut self, path: &Path) -> Result<Embedding, SkipReason> {
        let image = image::open(path)
            .map_err(|e| SkipReason::ImageLoad(e.to_string()))?
            .to_rgb8();
        self.enroll_image(&image)
    }

    /// Compute the embedding of the first face in an already decoded photo.
    pub fn enroll_image(&mut self, image: &RgbImage) -> Result<Embedding, SkipReason> {
        let faces = self
            .detector
            .detect(image)
            .map_err(|e| SkipReason::Detector(e.to_string()))?;
        let face = faces.first().ok_or(SkipReason::NoFaceDetected)?;

        let prepared = prepare_face(
            image,
            face,
            self.embedder.channel_order(),
            self.embedder.input_size(),
        )
        .map_err(|e| SkipReason::EmptyCrop(e.to_string()))?;

        self.embedder
            .embed(&prepared)
            .map_err(|e| SkipReason::Embedder(e.to_string()))
    }
}

/// Directory entries sorted by file name, hidden entries left out.
fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}
