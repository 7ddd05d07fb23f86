//! Frame type and pixel format conversion to RGB.

use image::RgbImage;

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Copy packed RGB24 (`RGB3`) bytes into an image, dropping any trailing padding.
pub fn rgb24_to_image(data: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height * 3) as usize;
    if data.len() < expected {
        return Err(FrameError::InvalidLength {
            format: "RGB3",
            expected,
            actual: data.len(),
        });
    }
    RgbImage::from_raw(width, height, data[..expected].to_vec()).ok_or(FrameError::Dimensions)
}

/// Convert packed YUYV (4:2:2) to RGB.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share the
/// chroma pair. Uses the BT.601 full-range coefficients.
pub fn yuyv_to_image(data: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height * 2) as usize;
    if data.len() < expected {
        return Err(FrameError::InvalidLength {
            format: "YUYV",
            expected,
            actual: data.len(),
        });
    }

    let mut out = Vec::with_capacity((width * height * 3) as usize);
    for chunk in data[..expected].chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for y in [chunk[0] as f32, chunk[2] as f32] {
            out.push(clamp_u8(y + 1.402 * v));
            out.push(clamp_u8(y - 0.344_136 * u - 0.714_136 * v));
            out.push(clamp_u8(y + 1.772 * u));
        }
    }
    RgbImage::from_raw(width, height, out).ok_or(FrameError::Dimensions)
}

/// Expand 8-bit grayscale (`GREY`) to RGB.
pub fn grey_to_image(data: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height) as usize;
    if data.len() < expected {
        return Err(FrameError::InvalidLength {
            format: "GREY",
            expected,
            actual: data.len(),
        });
    }
    let out = data[..expected].iter().flat_map(|&y| [y, y, y]).collect();
    RgbImage::from_raw(width, height, out).ok_or(FrameError::Dimensions)
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid {format} length: expected {expected}, got {actual}")]
    InvalidLength {
        format: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("frame dimensions do not match buffer")]
    Dimensions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rgb24_passthrough() {
        let data = vec![1, 2, 3, 4, 5, 6, 99]; // trailing padding byte
        let img = rgb24_to_image(&data, 2, 1).unwrap();
        assert_eq!(*img.get_pixel(0, 0), Rgb([1, 2, 3]));
        assert_eq!(*img.get_pixel(1, 0), Rgb([4, 5, 6]));
    }

    #[test]
    fn test_yuyv_neutral_chroma_is_grey() {
        // 2x1 image: [Y0=100, U=128, Y1=200, V=128]
        let yuyv = vec![100, 128, 200, 128];
        let img = yuyv_to_image(&yuyv, 2, 1).unwrap();
        assert_eq!(*img.get_pixel(0, 0), Rgb([100, 100, 100]));
        assert_eq!(*img.get_pixel(1, 0), Rgb([200, 200, 200]));
    }

    #[test]
    fn test_yuyv_red_chroma() {
        // Strong V pushes red up and green down.
        let yuyv = vec![128, 128, 128, 255];
        let img = yuyv_to_image(&yuyv, 2, 1).unwrap();
        let p = img.get_pixel(0, 0);
        assert_eq!(p[0], 255);
        assert!(p[1] < 128);
        assert_eq!(p[2], 128);
    }

    #[test]
    fn test_yuyv_4x2_dimensions() {
        let yuyv: Vec<u8> = (0..16).collect();
        let img = yuyv_to_image(&yuyv, 4, 2).unwrap();
        assert_eq!(img.dimensions(), (4, 2));
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128]; // too short for 2x1
        assert!(matches!(
            yuyv_to_image(&yuyv, 2, 1),
            Err(FrameError::InvalidLength { format: "YUYV", .. })
        ));
    }

    #[test]
    fn test_grey_expands_to_rgb() {
        let img = grey_to_image(&[7, 250], 2, 1).unwrap();
        assert_eq!(*img.get_pixel(0, 0), Rgb([7, 7, 7]));
        assert_eq!(*img.get_pixel(1, 0), Rgb([250, 250, 250]));
    }

    #[test]
    fn test_grey_invalid_length() {
        assert!(grey_to_image(&[1, 2, 3], 2, 2).is_err());
    }
}
