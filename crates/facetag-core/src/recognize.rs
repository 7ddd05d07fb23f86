//! Per-image recognition: detect every face, embed it, and name it.

use crate::crop::prepare_face;
use crate::detector::{Detector, DetectorError};
use crate::embedder::Embedder;
use crate::enrollment::Enrollment;
use crate::matcher::{MatchResult, Matcher};
use crate::types::BoundingBox;
use image::RgbImage;

/// A detected face and who it was matched to.
#[derive(Debug, Clone)]
pub struct LabeledFace {
    pub face: BoundingBox,
    pub result: MatchResult,
}

impl LabeledFace {
    pub fn name(&self) -> &str {
        self.result.name()
    }
}

/// Label every face found in `image`.
///
/// A face whose crop or embedding fails is logged and left out; a detector
/// failure fails the whole image.
pub fn label_faces<D, E, M>(
    detector: &mut D,
    embedder: &mut E,
    matcher: &M,
    enrollment: &Enrollment,
    image: &RgbImage,
    threshold: f32,
) -> Result<Vec<LabeledFace>, DetectorError>
where
    D: Detector + ?Sized,
    E: Embedder + ?Sized,
    M: Matcher + ?Sized,
{
    let faces = detector.detect(image)?;
    let mut labeled = Vec::with_capacity(faces.len());

    for face in faces {
        let prepared = match prepare_face(image, &face, embedder.channel_order(), embedder.input_size()) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(error = %e, "skipping face outside the frame");
                continue;
            }
        };

        let embedding = match embedder.embed(&prepared) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "embedding failed; skipping face");
                continue;
            }
        };

        let result = matcher.identify(&embedding, enrollment, threshold);
        tracing::debug!(
            label = result.name(),
            distance = result.distance,
            confidence = face.confidence,
            "face identified"
        );
        labeled.push(LabeledFace { face, result });
    }

    Ok(labeled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::EmbedderError;
    use crate::matcher::{EuclideanMatcher, UNKNOWN_LABEL};
    use crate::types::{ChannelOrder, Embedding};
    use image::Rgb;

    /// Reports fixed boxes regardless of content.
    struct FixedDetector(Vec<BoundingBox>);

    impl Detector for FixedDetector {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    /// Embeds the color of the crop's top-left pixel.
    struct CornerEmbedder;

    impl Embedder for CornerEmbedder {
        fn input_size(&self) -> u32 {
            4
        }

        fn channel_order(&self) -> ChannelOrder {
            ChannelOrder::Rgb
        }

        fn embed(&mut self, face: &RgbImage) -> Result<Embedding, EmbedderError> {
            let p = face.get_pixel(0, 0);
            Ok(Embedding::new(p.0.iter().map(|&v| v as f32 / 255.0).collect()))
        }
    }

    #[test]
    fn test_labels_each_detected_face() {
        // Left half red, right half blue.
        let image = RgbImage::from_fn(100, 50, |x, _| {
            if x < 50 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }
        });
        let mut enrollment = Enrollment::new();
        enrollment.insert("red", Embedding::new(vec![1.0, 0.0, 0.0])).unwrap();

        let mut detector = FixedDetector(vec![
            BoundingBox::new(0.0, 0.0, 50.0, 50.0, 0.9),
            BoundingBox::new(50.0, 0.0, 50.0, 50.0, 0.8),
            BoundingBox::new(500.0, 500.0, 10.0, 10.0, 0.7),
        ]);

        let labeled = label_faces(
            &mut detector,
            &mut CornerEmbedder,
            &EuclideanMatcher,
            &enrollment,
            &image,
            0.5,
        )
        .unwrap();

        // The off-frame box is dropped.
        assert_eq!(labeled.len(), 2);
        assert_eq!(labeled[0].name(), "red");
        assert_eq!(labeled[1].name(), UNKNOWN_LABEL);
        assert!((labeled[1].face.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_no_faces_gives_empty_list() {
        let image = RgbImage::new(10, 10);
        let labeled = label_faces(
            &mut FixedDetector(vec![]),
            &mut CornerEmbedder,
            &EuclideanMatcher,
            &Enrollment::new(),
            &image,
            1.0,
        )
        .unwrap();
        assert!(labeled.is_empty());
    }
}
