//! Face preparation: crop to the detection, reorder channels, resize.
//!
//! Produces the fixed-size square crop an [`Embedder`](crate::Embedder)
//! consumes. Enrollment and live recognition share this path so both sides
//! of a comparison see identically prepared faces.

use crate::types::{BoundingBox, ChannelOrder};
use image::imageops::{self, FilterType};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CropError {
    #[error("bounding box ({x}, {y}, {width}x{height}) lies outside the {image_width}x{image_height} image")]
    EmptyBox {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        image_width: u32,
        image_height: u32,
    },
    #[error("target size must be non-zero")]
    ZeroSize,
}

/// Cut the detected face out of `image`, clamping the box to the image bounds.
pub fn crop_face(image: &RgbImage, face: &BoundingBox) -> Result<RgbImage, CropError> {
    let (x, y, w, h) = face
        .clamp_to(image.width(), image.height())
        .ok_or(CropError::EmptyBox {
            x: face.x,
            y: face.y,
            width: face.width,
            height: face.height,
            image_width: image.width(),
            image_height: image.height(),
        })?;

    Ok(imageops::crop_imm(image, x, y, w, h).to_image())
}

/// Rewrite an RGB buffer into `order`. A no-op for [`ChannelOrder::Rgb`].
pub fn to_channel_order(mut image: RgbImage, order: ChannelOrder) -> RgbImage {
    if order == ChannelOrder::Bgr {
        for pixel in image.pixels_mut() {
            pixel.0.swap(0, 2);
        }
    }
    image
}

/// Crop, reorder and resize a detected face to a `size`×`size` embedder input.
pub fn prepare_face(
    image: &RgbImage,
    face: &BoundingBox,
    order: ChannelOrder,
    size: u32,
) -> Result<RgbImage, CropError> {
    if size == 0 {
        return Err(CropError::ZeroSize);
    }
    let cropped = crop_face(image, face)?;
    let reordered = to_channel_order(cropped, order);
    Ok(imageops::resize(&reordered, size, size, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn quadrants(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| match (x < w / 2, y < h / 2) {
            (true, true) => Rgb([255, 0, 0]),
            (false, true) => Rgb([0, 255, 0]),
            (true, false) => Rgb([0, 0, 255]),
            (false, false) => Rgb([255, 255, 255]),
        })
    }

    #[test]
    fn test_crop_face_region() {
        let img = quadrants(100, 100);
        let face = BoundingBox::new(50.0, 0.0, 50.0, 50.0, 0.9);
        let crop = crop_face(&img, &face).unwrap();
        assert_eq!(crop.dimensions(), (50, 50));
        assert!(crop.pixels().all(|p| *p == Rgb([0, 255, 0])));
    }

    #[test]
    fn test_crop_clamps_partial_box() {
        let img = quadrants(100, 100);
        let face = BoundingBox::new(-20.0, -20.0, 50.0, 50.0, 0.9);
        let crop = crop_face(&img, &face).unwrap();
        assert_eq!(crop.dimensions(), (30, 30));
    }

    #[test]
    fn test_crop_outside_is_error() {
        let img = quadrants(100, 100);
        let face = BoundingBox::new(150.0, 150.0, 10.0, 10.0, 0.9);
        assert!(matches!(crop_face(&img, &face), Err(CropError::EmptyBox { .. })));
    }

    #[test]
    fn test_bgr_swaps_red_and_blue() {
        let img = RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]));
        let bgr = to_channel_order(img.clone(), ChannelOrder::Bgr);
        assert!(bgr.pixels().all(|p| *p == Rgb([30, 20, 10])));
        let rgb = to_channel_order(img, ChannelOrder::Rgb);
        assert!(rgb.pixels().all(|p| *p == Rgb([10, 20, 30])));
    }

    #[test]
    fn test_prepare_face_output_size() {
        let img = quadrants(640, 480);
        let face = BoundingBox::new(100.0, 80.0, 120.0, 150.0, 0.9);
        let prepared = prepare_face(&img, &face, ChannelOrder::Rgb, 160).unwrap();
        assert_eq!(prepared.dimensions(), (160, 160));
    }

    #[test]
    fn test_prepare_face_uniform_region_stays_uniform() {
        let img = quadrants(200, 200);
        let face = BoundingBox::new(0.0, 0.0, 100.0, 100.0, 0.9);
        let prepared = prepare_face(&img, &face, ChannelOrder::Bgr, 32).unwrap();
        assert!(prepared.pixels().all(|p| *p == Rgb([0, 0, 255])));
    }

    #[test]
    fn test_prepare_face_zero_size() {
        let img = quadrants(10, 10);
        let face = BoundingBox::new(0.0, 0.0, 5.0, 5.0, 0.9);
        assert_eq!(
            prepare_face(&img, &face, ChannelOrder::Rgb, 0),
            Err(CropError::ZeroSize)
        );
    }
}
