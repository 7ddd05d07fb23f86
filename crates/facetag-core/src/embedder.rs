//! FaceNet face embedder via ONNX Runtime.
//!
//! Turns a prepared square face crop into an L2-normalized identity vector
//! (512 dimensions for the common Keras FaceNet export).

use crate::types::{ChannelOrder, Embedding};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Side length of the square FaceNet input.
pub const FACENET_INPUT_SIZE: u32 = 160;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("model file not found: {0}; export FaceNet to ONNX and place it in the model directory")]
    ModelNotFound(String),
    #[error("expected a {expected}x{expected} face crop, got {width}x{height}")]
    InvalidInput {
        expected: u32,
        width: u32,
        height: u32,
    },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Produces an embedding from a prepared face crop.
///
/// Callers hand in a crop of `input_size()`×`input_size()` pixels whose
/// channels are already in `channel_order()`
/// (see [`prepare_face`](crate::crop::prepare_face)).
pub trait Embedder {
    fn input_size(&self) -> u32;
    fn channel_order(&self) -> ChannelOrder;
    fn embed(&mut self, face: &RgbImage) -> Result<Embedding, EmbedderError>;
}

/// Memory layout of the model's input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, as exported from Keras.
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`, as exported from PyTorch.
    Nchw,
}

impl std::str::FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nhwc" => Ok(Self::Nhwc),
            "nchw" => Ok(Self::Nchw),
            other => Err(format!("unknown tensor layout {other:?} (expected nhwc or nchw)")),
        }
    }
}

/// How the FaceNet model expects its input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbedderOptions {
    pub input_size: u32,
    pub channel_order: ChannelOrder,
    pub layout: TensorLayout,
}

impl Default for EmbedderOptions {
    fn default() -> Self {
        Self {
            input_size: FACENET_INPUT_SIZE,
            channel_order: ChannelOrder::Rgb,
            layout: TensorLayout::Nhwc,
        }
    }
}

/// FaceNet-based embedder.
pub struct FaceEmbedder {
    session: Session,
    options: EmbedderOptions,
}

impl FaceEmbedder {
    /// Load the FaceNet ONNX model from the given path.
    pub fn load(model_path: &Path, options: EmbedderOptions) -> Result<Self, EmbedderError> {
        if !model_path.exists() {
            return Err(EmbedderError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            input_size = options.input_size,
            channel_order = ?options.channel_order,
            layout = ?options.layout,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded FaceNet model"
        );

        Ok(Self { session, options })
    }
}

impl Embedder for FaceEmbedder {
    fn input_size(&self) -> u32 {
        self.options.input_size
    }

    fn channel_order(&self) -> ChannelOrder {
        self.options.channel_order
    }

    fn embed(&mut self, face: &RgbImage) -> Result<Embedding, EmbedderError> {
        let size = self.options.input_size;
        if face.dimensions() != (size, size) {
            return Err(EmbedderError::InvalidInput {
                expected: size,
                width: face.width(),
                height: face.height(),
            });
        }

        let input = preprocess(face, self.options.layout);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw_data.is_empty() {
            return Err(EmbedderError::InferenceFailed("model returned an empty embedding".into()));
        }

        Ok(Embedding::new(l2_normalize(raw_data.to_vec())))
    }
}

/// Standardize a face crop into the model's input tensor.
///
/// FaceNet is trained on per-image whitened input: subtract the mean over all
/// samples and divide by the standard deviation, floored at `1/sqrt(n)` so a
/// flat image does not blow up.
fn preprocess(face: &RgbImage, layout: TensorLayout) -> Array4<f32> {
    let (w, h) = (face.width() as usize, face.height() as usize);
    let raw = face.as_raw();
    let n = raw.len().max(1) as f32;

    let mean = raw.iter().map(|&p| p as f32).sum::<f32>() / n;
    let var = raw.iter().map(|&p| (p as f32 - mean).powi(2)).sum::<f32>() / n;
    let std_adj = var.sqrt().max(1.0 / n.sqrt());

    let mut tensor = match layout {
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, h, w, 3)),
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, h, w)),
    };

    for (x, y, pixel) in face.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = (pixel[c] as f32 - mean) / std_adj;
            match layout {
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
            }
        }
    }

    tensor
}

fn l2_normalize(raw: Vec<f32>) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Rgb;

    fn gradient(size: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            Rgb([(x * 255 / size) as u8, (y * 255 / size) as u8, 64])
        })
    }

    #[test]
    fn test_preprocess_shapes() {
        let face = gradient(FACENET_INPUT_SIZE);
        let s = FACENET_INPUT_SIZE as usize;
        assert_eq!(preprocess(&face, TensorLayout::Nhwc).shape(), &[1, s, s, 3]);
        assert_eq!(preprocess(&face, TensorLayout::Nchw).shape(), &[1, 3, s, s]);
    }

    #[test]
    fn test_preprocess_is_standardized() {
        let face = gradient(32);
        let tensor = preprocess(&face, TensorLayout::Nhwc);
        let n = tensor.len() as f32;
        let mean = tensor.iter().sum::<f32>() / n;
        let var = tensor.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        assert!(mean.abs() < 1e-4, "mean = {mean}");
        assert!((var - 1.0).abs() < 1e-3, "var = {var}");
    }

    #[test]
    fn test_preprocess_flat_image_is_zero() {
        let face = RgbImage::from_pixel(16, 16, Rgb([90, 90, 90]));
        let tensor = preprocess(&face, TensorLayout::Nchw);
        assert!(tensor.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_preprocess_layouts_agree() {
        let face = gradient(8);
        let nhwc = preprocess(&face, TensorLayout::Nhwc);
        let nchw = preprocess(&face, TensorLayout::Nchw);
        for y in 0..8 {
            for x in 0..8 {
                for c in 0..3 {
                    assert_eq!(nhwc[[0, y, x, c]], nchw[[0, c, y, x]]);
                }
            }
        }
    }

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert_relative_eq!(v[0], 0.6);
        assert_relative_eq!(v[1], 0.8);
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_layout_parse() {
        assert_eq!("NHWC".parse::<TensorLayout>(), Ok(TensorLayout::Nhwc));
        assert_eq!("nchw".parse::<TensorLayout>(), Ok(TensorLayout::Nchw));
        assert!("chw".parse::<TensorLayout>().is_err());
    }
}
