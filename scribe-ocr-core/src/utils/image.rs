//! Resizing and padding of page and line rasters.

use crate::core::OCRError;
use ::image::imageops::{self, FilterType};
use ::image::{DynamicImage, GrayImage, Luma};

/// Rejects rasters with a zero dimension.
///
/// # Arguments
///
/// * `size` - `[width, height]` of the raster
///
/// # Errors
///
/// Returns `OCRError::InvalidInput` when either dimension is zero.
pub fn check_image_size(size: &[u32; 2]) -> Result<(), OCRError> {
    if size[0] == 0 || size[1] == 0 {
        return Err(OCRError::invalid_input(format!(
            "image dimensions must be positive, got {}x{}",
            size[0], size[1]
        )));
    }
    Ok(())
}

/// Width after scaling a `width x height` raster to `target_height`, keeping
/// the aspect ratio. Never below one pixel.
pub fn scaled_width(width: u32, height: u32, target_height: u32) -> u32 {
    if height == 0 {
        return 1;
    }
    ((width as f64 * target_height as f64 / height as f64).round() as u32).max(1)
}

/// Scales a grayscale line image to `target_height`, keeping the aspect ratio.
pub fn resize_to_height(img: &GrayImage, target_height: u32) -> Result<GrayImage, OCRError> {
    let (w, h) = img.dimensions();
    check_image_size(&[w, h])?;
    check_image_size(&[1, target_height])?;
    if h == target_height {
        return Ok(img.clone());
    }
    let new_w = scaled_width(w, h, target_height);
    Ok(imageops::resize(img, new_w, target_height, FilterType::Triangle))
}

/// Scales a page to `target_height`, keeping the aspect ratio.
pub fn resize_page_to_height(
    img: &DynamicImage,
    target_height: u32,
) -> Result<DynamicImage, OCRError> {
    check_image_size(&[img.width(), img.height()])?;
    check_image_size(&[1, target_height])?;
    if img.height() == target_height {
        return Ok(img.clone());
    }
    let new_w = scaled_width(img.width(), img.height(), target_height);
    Ok(img.resize_exact(new_w, target_height, FilterType::Triangle))
}

/// Adds `pad` white columns to both sides of a line image.
pub fn pad_horizontal(img: &GrayImage, pad: u32) -> GrayImage {
    if pad == 0 {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    let mut canvas = GrayImage::from_pixel(w + 2 * pad, h, Luma([255]));
    imageops::replace(&mut canvas, img, pad as i64, 0);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_width_keeps_aspect() {
        assert_eq!(scaled_width(200, 50, 100), 400);
        assert_eq!(scaled_width(1, 100, 10), 1);
        assert_eq!(scaled_width(10, 0, 10), 1);
    }

    #[test]
    fn test_resize_to_height() {
        let img = GrayImage::from_pixel(60, 20, Luma([0]));
        let resized = resize_to_height(&img, 40).unwrap();
        assert_eq!(resized.dimensions(), (120, 40));
        assert!(resize_to_height(&GrayImage::new(0, 10), 40).is_err());
    }

    #[test]
    fn test_pad_horizontal_adds_white_columns() {
        let img = GrayImage::from_pixel(4, 3, Luma([0]));
        let padded = pad_horizontal(&img, 2);
        assert_eq!(padded.dimensions(), (8, 3));
        assert_eq!(padded.get_pixel(0, 1)[0], 255);
        assert_eq!(padded.get_pixel(2, 1)[0], 0);
        assert_eq!(padded.get_pixel(7, 1)[0], 255);
    }
}
