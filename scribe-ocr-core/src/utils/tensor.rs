//! Conversion of rasters into network input tensors.

use crate::core::OCRError;
use ::image::{DynamicImage, GrayImage};
use ndarray::Array4;

/// Converts a grayscale image into a `[1, channels, H, W]` tensor in `[0, 1]`.
///
/// With `channels == 3` the gray plane is replicated. With `invert` the
/// values become `1 - v`, i.e. ink is bright.
pub fn gray_to_tensor(img: &GrayImage, channels: u32, invert: bool) -> Result<Array4<f32>, OCRError> {
    if channels != 1 && channels != 3 {
        return Err(OCRError::invalid_input(format!(
            "unsupported input channel count {channels}, expected 1 or 3"
        )));
    }
    let (w, h) = img.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, channels as usize, h as usize, w as usize));
    for (x, y, p) in img.enumerate_pixels() {
        let v = p[0] as f32 / 255.0;
        let v = if invert { 1.0 - v } else { v };
        for c in 0..channels as usize {
            tensor[[0, c, y as usize, x as usize]] = v;
        }
    }
    Ok(tensor)
}

/// Converts a page raster into a `[1, channels, H, W]` tensor in `[0, 1]`.
pub fn page_to_tensor(img: &DynamicImage, channels: u32) -> Result<Array4<f32>, OCRError> {
    match channels {
        1 => gray_to_tensor(&img.to_luma8(), 1, false),
        3 => {
            let rgb = img.to_rgb8();
            let (w, h) = rgb.dimensions();
            let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
            for (x, y, p) in rgb.enumerate_pixels() {
                for c in 0..3 {
                    tensor[[0, c, y as usize, x as usize]] = p[c] as f32 / 255.0;
                }
            }
            Ok(tensor)
        }
        other => Err(OCRError::invalid_input(format!(
            "unsupported input channel count {other}, expected 1 or 3"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{Luma, Rgb, RgbImage};

    #[test]
    fn test_gray_to_tensor_scales_and_inverts() {
        let mut img = GrayImage::from_pixel(3, 2, Luma([255]));
        img.put_pixel(1, 0, Luma([0]));
        let t = gray_to_tensor(&img, 1, false).unwrap();
        assert_eq!(t.shape(), &[1, 1, 2, 3]);
        assert_eq!(t[[0, 0, 0, 1]], 0.0);
        assert_eq!(t[[0, 0, 1, 2]], 1.0);

        let inv = gray_to_tensor(&img, 3, true).unwrap();
        assert_eq!(inv.shape(), &[1, 3, 2, 3]);
        assert_eq!(inv[[0, 2, 0, 1]], 1.0);
        assert!(gray_to_tensor(&img, 2, false).is_err());
    }

    #[test]
    fn test_page_to_tensor_rgb() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([255, 0, 51])));
        let t = page_to_tensor(&img, 3).unwrap();
        assert_eq!(t[[0, 0, 1, 1]], 1.0);
        assert_eq!(t[[0, 1, 1, 1]], 0.0);
        assert!((t[[0, 2, 0, 0]] - 0.2).abs() < 1e-6);
    }
}
