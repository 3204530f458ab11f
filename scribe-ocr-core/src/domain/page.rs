//! Page rasters supplied by the image I/O layer.

use crate::core::errors::{OCRError, OcrResult};
use crate::processors::geometry::Rect;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, LumaA, Rgb, Rgba};
use std::sync::Arc;

/// Pixel layout of a raw page buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// 8-bit grayscale.
    Gray,
    /// 8-bit grayscale with alpha.
    GrayAlpha,
    /// 8-bit RGB.
    Rgb,
    /// 8-bit RGBA.
    Rgba,
}

impl ColorMode {
    /// Bytes per pixel.
    pub fn channels(&self) -> usize {
        match self {
            ColorMode::Gray => 1,
            ColorMode::GrayAlpha => 2,
            ColorMode::Rgb => 3,
            ColorMode::Rgba => 4,
        }
    }
}

/// An immutable page raster with optional resolution metadata.
///
/// Cloning is cheap; the pixel buffer is shared.
#[derive(Debug, Clone)]
pub struct PageImage {
    image: Arc<DynamicImage>,
    resolution: Option<(f32, f32)>,
}

impl PageImage {
    /// Wraps a decoded pixel buffer of `width` x `height` pixels.
    pub fn from_raw(width: u32, height: u32, mode: ColorMode, pixels: Vec<u8>) -> OcrResult<Self> {
        let expected = width as usize * height as usize * mode.channels();
        if width == 0 || height == 0 {
            return Err(OCRError::invalid_input(format!(
                "page has zero extent: {width}x{height}"
            )));
        }
        if pixels.len() != expected {
            return Err(OCRError::invalid_input(format!(
                "page buffer holds {} bytes, expected {expected} for {width}x{height} {mode:?}",
                pixels.len()
            )));
        }
        let mismatch = || OCRError::invalid_input("page buffer does not match its dimensions");
        let image = match mode {
            ColorMode::Gray => DynamicImage::ImageLuma8(
                ImageBuffer::<Luma<u8>, _>::from_raw(width, height, pixels).ok_or_else(mismatch)?,
            ),
            ColorMode::GrayAlpha => DynamicImage::ImageLumaA8(
                ImageBuffer::<LumaA<u8>, _>::from_raw(width, height, pixels)
                    .ok_or_else(mismatch)?,
            ),
            ColorMode::Rgb => DynamicImage::ImageRgb8(
                ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, pixels).ok_or_else(mismatch)?,
            ),
            ColorMode::Rgba => DynamicImage::ImageRgba8(
                ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, pixels).ok_or_else(mismatch)?,
            ),
        };
        Ok(Self::from_dynamic(image))
    }

    /// Wraps an already decoded image.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
            resolution: None,
        }
    }

    /// Attaches a horizontal and vertical resolution in dots per inch.
    pub fn with_resolution(mut self, x_dpi: f32, y_dpi: f32) -> Self {
        self.resolution = Some((x_dpi, y_dpi));
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn resolution(&self) -> Option<(f32, f32)> {
        self.resolution
    }

    /// Page extent as a rectangle in pixel coordinates.
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width(), self.height())
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Grayscale copy of the page.
    pub fn to_gray(&self) -> GrayImage {
        self.image.to_luma8()
    }

    /// True if the source raster carries color channels.
    pub fn is_color(&self) -> bool {
        self.image.color().has_color()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_validates_length() {
        assert!(PageImage::from_raw(4, 2, ColorMode::Gray, vec![255; 8]).is_ok());
        let err = PageImage::from_raw(4, 2, ColorMode::Rgb, vec![255; 8]).unwrap_err();
        assert!(matches!(err, OCRError::InvalidInput { .. }));
        assert!(PageImage::from_raw(0, 2, ColorMode::Gray, vec![]).is_err());
    }

    #[test]
    fn test_clone_shares_pixels() {
        let page = PageImage::from_raw(3, 3, ColorMode::Rgb, vec![10; 27])
            .unwrap()
            .with_resolution(300.0, 300.0);
        let copy = page.clone();
        assert!(std::ptr::eq(page.as_dynamic(), copy.as_dynamic()));
        assert_eq!(copy.resolution(), Some((300.0, 300.0)));
        assert!(copy.is_color());
        assert_eq!(copy.to_gray().dimensions(), (3, 3));
    }
}
