//! Cutting line images out of a page and turning them into network input.

use crate::core::config::{ConfigError, ConfigValidator};
use crate::core::{OCRError, OcrResult};
use crate::domain::page::PageImage;
use crate::domain::segmentation::LinePolygon;
use crate::utils::{gray_to_tensor, pad_horizontal, resize_to_height};
use image::imageops;
use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use ndarray::Array4;
use serde::{Deserialize, Serialize};

/// Line image preparation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineExtractConfig {
    /// White columns added to both sides before scaling (default: 16).
    #[serde(default = "LineExtractConfig::default_pad")]
    pub pad: u32,
    /// Narrower line images are rejected (default: 4).
    #[serde(default = "LineExtractConfig::default_min_size")]
    pub min_width: u32,
    /// Lower line images are rejected (default: 4).
    #[serde(default = "LineExtractConfig::default_min_size")]
    pub min_height: u32,
    /// Feed the network bright ink on a dark background.
    #[serde(default)]
    pub invert: bool,
}

impl LineExtractConfig {
    pub fn with_pad(mut self, pad: u32) -> Self {
        self.pad = pad;
        self
    }

    pub fn with_min_size(mut self, width: u32, height: u32) -> Self {
        self.min_width = width;
        self.min_height = height;
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    fn default_pad() -> u32 {
        16
    }

    fn default_min_size() -> u32 {
        4
    }
}

impl Default for LineExtractConfig {
    fn default() -> Self {
        Self {
            pad: Self::default_pad(),
            min_width: Self::default_min_size(),
            min_height: Self::default_min_size(),
            invert: false,
        }
    }
}

impl ConfigValidator for LineExtractConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_non_zero("min_width", self.min_width as usize)?;
        self.validate_non_zero("min_height", self.min_height as usize)
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Crops the line's bounding box from the page and whitens everything outside
/// the line polygon.
pub fn extract_line(page: &PageImage, line: &LinePolygon) -> OcrResult<GrayImage> {
    let rect = line
        .bounding_rect()
        .ok_or_else(|| OCRError::recognition_failure(format!("line {} has no geometry", line.id)))?;
    let x0 = rect.x_min.floor().max(0.0) as u32;
    let y0 = rect.y_min.floor().max(0.0) as u32;
    let x1 = (rect.x_max.ceil().max(0.0) as u32).min(page.width());
    let y1 = (rect.y_max.ceil().max(0.0) as u32).min(page.height());
    if x1 <= x0 || y1 <= y0 {
        return Err(OCRError::recognition_failure(format!(
            "line {} lies outside the page",
            line.id
        )));
    }

    let gray = page.to_gray();
    let mut crop = imageops::crop_imm(&gray, x0, y0, x1 - x0, y1 - y0).to_image();

    let mut outline: Vec<_> = line
        .boundary
        .points
        .iter()
        .map(|p| Point::new(p.x.round() as i32 - x0 as i32, p.y.round() as i32 - y0 as i32))
        .collect();
    // draw_polygon_mut rejects closed outlines and needs at least three vertices.
    outline.dedup();
    while outline.len() > 1 && outline.first() == outline.last() {
        outline.pop();
    }
    if outline.len() >= 3 {
        let mut mask = GrayImage::new(crop.width(), crop.height());
        draw_polygon_mut(&mut mask, &outline, Luma([255u8]));
        for (x, y, p) in crop.enumerate_pixels_mut() {
            if mask.get_pixel(x, y)[0] == 0 {
                *p = Luma([255]);
            }
        }
    }
    Ok(crop)
}

/// Pads and scales a line image into a `[1, channels, height, W]` tensor.
///
/// Fails with `RecognitionFailure` when the image is below the size floor.
pub fn prepare_line(
    line: &GrayImage,
    input_height: u32,
    input_channels: u32,
    config: &LineExtractConfig,
) -> OcrResult<Array4<f32>> {
    let (w, h) = line.dimensions();
    if w < config.min_width || h < config.min_height {
        return Err(OCRError::recognition_failure(format!(
            "line image {w}x{h} is below the minimum size {}x{}",
            config.min_width, config.min_height
        )));
    }
    let padded = pad_horizontal(line, config.pad);
    let scaled = resize_to_height(&padded, input_height)?;
    gray_to_tensor(&scaled, input_channels, config.invert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::page::ColorMode;
    use crate::processors::geometry::{Point as PagePoint, Polygon, Polyline};

    fn line(points: &[(f32, f32)]) -> LinePolygon {
        let boundary = Polygon::new(points.iter().map(|&(x, y)| PagePoint::new(x, y)).collect());
        LinePolygon {
            id: 0,
            line_type: "default".to_string(),
            baseline: Polyline::new(vec![PagePoint::new(0.0, 0.0)]),
            boundary,
            region: None,
            score: 1.0,
        }
    }

    fn black_page(w: u32, h: u32) -> PageImage {
        PageImage::from_raw(w, h, ColorMode::Gray, vec![0; (w * h) as usize]).unwrap()
    }

    #[test]
    fn test_extract_masks_outside_polygon() {
        let page = black_page(100, 60);
        // Triangle: the top-right corner of its bounding box is outside.
        let crop = extract_line(&page, &line(&[(10.0, 10.0), (50.0, 50.0), (10.0, 50.0)])).unwrap();
        assert_eq!(crop.dimensions(), (40, 40));
        assert_eq!(crop.get_pixel(38, 1)[0], 255);
        assert_eq!(crop.get_pixel(2, 38)[0], 0);
    }

    #[test]
    fn test_extract_outside_page_fails() {
        let page = black_page(100, 60);
        let err = extract_line(&page, &line(&[(200.0, 200.0), (250.0, 200.0), (250.0, 230.0)]))
            .unwrap_err();
        assert!(err.is_recognition_failure());
    }

    #[test]
    fn test_prepare_rejects_one_pixel_wide_crop() {
        let img = GrayImage::from_pixel(1, 48, Luma([0]));
        let err = prepare_line(&img, 48, 1, &LineExtractConfig::default()).unwrap_err();
        assert!(err.is_recognition_failure());
    }

    #[test]
    fn test_prepare_pads_and_scales() {
        let img = GrayImage::from_pixel(40, 24, Luma([0]));
        let tensor = prepare_line(&img, 48, 1, &LineExtractConfig::default()).unwrap();
        // (40 + 32) * 2 wide after doubling the height.
        assert_eq!(tensor.shape(), &[1, 1, 48, 144]);
        assert_eq!(tensor[[0, 0, 24, 0]], 1.0);
        assert_eq!(tensor[[0, 0, 24, 72]], 0.0);
    }
}
