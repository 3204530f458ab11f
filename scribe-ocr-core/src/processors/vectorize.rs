//! Vectorization of segmentation heatmaps.
//!
//! The [`HeatmapVectorizer`] turns a `[C, H, W]` probability map into baseline
//! polylines and region hulls. Baseline channels are thresholded, thinned to a
//! one pixel skeleton and split into connected components; the longest path
//! through each component becomes a baseline after simplification. Region
//! channels are thresholded and each component's convex hull becomes a region.
//!
//! All geometry is returned in page coordinates: the caller passes the page
//! size and the heatmap is scaled up to it.

#[path = "vectorize_skeleton.rs"]
mod skeleton;

use crate::core::config::{ConfigError, ConfigValidator};
use crate::domain::segmentation::{
    BaselineHypothesis, RegionType, SegmentationDescriptor, TextDirection,
};
use crate::processors::geometry::{Point, Polygon, Polyline};
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::region_labelling::{Connectivity, connected_components};
use ndarray::{Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Radius in heatmap pixels of the window sampled around baseline endpoints
/// in the separator channels.
const SEPARATOR_WINDOW: i64 = 3;

/// Thresholds and simplification settings for heatmap vectorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizeConfig {
    /// Pixels above this probability are foreground (default: 0.3).
    #[serde(default = "VectorizeConfig::default_pixel_threshold")]
    pub pixel_threshold: f32,
    /// Components whose mean probability is below this are discarded (default: 0.5).
    #[serde(default = "VectorizeConfig::default_min_confidence")]
    pub min_confidence: f32,
    /// Minimum baseline length in page pixels (default: 5).
    #[serde(default = "VectorizeConfig::default_min_baseline_length")]
    pub min_baseline_length: f32,
    /// Douglas-Peucker tolerance for baselines in page pixels (default: 1).
    #[serde(default = "VectorizeConfig::default_max_deviation")]
    pub max_deviation: f32,
    /// Upper bound on baseline vertices (default: 32).
    #[serde(default = "VectorizeConfig::default_max_points")]
    pub max_points: usize,
    /// Minimum region area in page pixels (default: 100).
    #[serde(default = "VectorizeConfig::default_min_region_area")]
    pub min_region_area: f32,
    /// Dilate region masks by one pixel before labelling.
    #[serde(default)]
    pub dilate_regions: bool,
}

impl VectorizeConfig {
    pub fn with_pixel_threshold(mut self, threshold: f32) -> Self {
        self.pixel_threshold = threshold;
        self
    }

    pub fn with_min_confidence(mut self, confidence: f32) -> Self {
        self.min_confidence = confidence;
        self
    }

    pub fn with_min_baseline_length(mut self, length: f32) -> Self {
        self.min_baseline_length = length;
        self
    }

    pub fn with_max_deviation(mut self, deviation: f32) -> Self {
        self.max_deviation = deviation;
        self
    }

    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }

    pub fn with_min_region_area(mut self, area: f32) -> Self {
        self.min_region_area = area;
        self
    }

    pub fn with_dilate_regions(mut self, dilate: bool) -> Self {
        self.dilate_regions = dilate;
        self
    }

    fn default_pixel_threshold() -> f32 {
        0.3
    }

    fn default_min_confidence() -> f32 {
        0.5
    }

    fn default_min_baseline_length() -> f32 {
        5.0
    }

    fn default_max_deviation() -> f32 {
        1.0
    }

    fn default_max_points() -> usize {
        32
    }

    fn default_min_region_area() -> f32 {
        100.0
    }
}

impl Default for VectorizeConfig {
    fn default() -> Self {
        Self {
            pixel_threshold: Self::default_pixel_threshold(),
            min_confidence: Self::default_min_confidence(),
            min_baseline_length: Self::default_min_baseline_length(),
            max_deviation: Self::default_max_deviation(),
            max_points: Self::default_max_points(),
            min_region_area: Self::default_min_region_area(),
            dilate_regions: false,
        }
    }
}

impl ConfigValidator for VectorizeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_range("pixel_threshold", self.pixel_threshold, 0.0, 1.0)?;
        self.validate_range("min_confidence", self.min_confidence, 0.0, 1.0)?;
        self.validate_range(
            "min_baseline_length",
            self.min_baseline_length,
            0.0,
            f32::MAX,
        )?;
        self.validate_range("max_deviation", self.max_deviation, 0.0, f32::MAX)?;
        self.validate_range("min_region_area", self.min_region_area, 0.0, f32::MAX)?;
        if self.max_points < 2 {
            return Err(ConfigError::InvalidConfig {
                message: format!("max_points must be at least 2, got {}", self.max_points),
            });
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// A region component before region ids are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCandidate {
    pub region_type: RegionType,
    pub hull: Polygon,
    /// Mean probability inside the component.
    pub score: f32,
    /// Component area in page pixels.
    pub area: f32,
}

/// Maps heatmap pixel centres onto page coordinates.
#[derive(Debug, Clone, Copy)]
struct Scale {
    sx: f32,
    sy: f32,
}

impl Scale {
    fn new(heatmap_w: usize, heatmap_h: usize, page_w: u32, page_h: u32) -> Self {
        Self {
            sx: page_w as f32 / heatmap_w.max(1) as f32,
            sy: page_h as f32 / heatmap_h.max(1) as f32,
        }
    }

    fn centre(&self, x: u32, y: u32) -> Point {
        Point::new(
            (x as f32 + 0.5) * self.sx - 0.5,
            (y as f32 + 0.5) * self.sy - 0.5,
        )
    }

    fn corner(&self, x: u32, y: u32) -> Point {
        Point::new(x as f32 * self.sx, y as f32 * self.sy)
    }

    fn pixel_area(&self) -> f32 {
        self.sx * self.sy
    }
}

/// Vectorizer for segmentation heatmaps.
#[derive(Debug, Clone, Default)]
pub struct HeatmapVectorizer {
    pub config: VectorizeConfig,
}

impl HeatmapVectorizer {
    pub fn new(config: VectorizeConfig) -> Self {
        Self { config }
    }

    /// Extracts baselines from every baseline channel of `heatmap`.
    ///
    /// Baselines are oriented with the separator channels when the model has
    /// them, otherwise along `direction`. The result is ordered by channel,
    /// then by component label.
    pub fn baselines(
        &self,
        heatmap: &Array3<f32>,
        descriptor: &SegmentationDescriptor,
        direction: TextDirection,
        page_size: (u32, u32),
    ) -> Vec<BaselineHypothesis> {
        let (_, h, w) = heatmap.dim();
        let scale = Scale::new(w, h, page_size.0, page_size.1);
        let start_sep = descriptor
            .start_separator()
            .map(|c| heatmap.index_axis(Axis(0), c));
        let end_sep = descriptor
            .end_separator()
            .map(|c| heatmap.index_axis(Axis(0), c));

        let mut baselines = Vec::new();
        for (channel, line_type) in descriptor.baseline_channels() {
            if channel >= heatmap.dim().0 {
                continue;
            }
            let probs = heatmap.index_axis(Axis(0), channel);
            let mask = threshold(&probs, self.config.pixel_threshold);
            let skeleton = skeleton::thin(&mask);

            for pixels in components(&skeleton) {
                let score = mean_prob(&probs, &pixels);
                if score < self.config.min_confidence {
                    continue;
                }
                let mut path = skeleton::longest_path(&pixels);
                if let (Some(start), Some(end)) = (&start_sep, &end_sep) {
                    if separator_says_reverse(start, end, &path) {
                        path.reverse();
                    }
                } else {
                    orient_by_direction(&mut path, direction);
                }

                let polyline = Polyline::new(path.iter().map(|&(x, y)| scale.centre(x, y)).collect());
                if polyline.length() < self.config.min_baseline_length {
                    continue;
                }
                let points = polyline.simplify_bounded(self.config.max_deviation, self.config.max_points);
                baselines.push(BaselineHypothesis {
                    line_type: line_type.to_string(),
                    points,
                    score,
                });
            }
        }
        debug!("vectorized {} baseline(s)", baselines.len());
        baselines
    }

    /// Extracts region hulls from every region channel of `heatmap`.
    pub fn regions(
        &self,
        heatmap: &Array3<f32>,
        descriptor: &SegmentationDescriptor,
        page_size: (u32, u32),
    ) -> Vec<RegionCandidate> {
        let (_, h, w) = heatmap.dim();
        let scale = Scale::new(w, h, page_size.0, page_size.1);

        let mut regions = Vec::new();
        for (channel, region_type) in descriptor.region_channels() {
            if channel >= heatmap.dim().0 {
                continue;
            }
            let probs = heatmap.index_axis(Axis(0), channel);
            let mut mask = threshold(&probs, self.config.pixel_threshold);
            if self.config.dilate_regions {
                mask = imageproc::morphology::dilate(&mask, Norm::LInf, 1);
            }

            for pixels in components(&mask) {
                let area = pixels.len() as f32 * scale.pixel_area();
                if area < self.config.min_region_area {
                    continue;
                }
                let score = mean_prob(&probs, &pixels);
                if score < self.config.min_confidence {
                    continue;
                }
                let hull = Polygon::convex_hull(&row_extremes(&pixels, &scale));
                if hull.len() < 3 {
                    continue;
                }
                regions.push(RegionCandidate {
                    region_type: region_type.clone(),
                    hull,
                    score,
                    area,
                });
            }
        }
        debug!("vectorized {} region(s)", regions.len());
        regions
    }
}

fn threshold(probs: &ArrayView2<'_, f32>, thresh: f32) -> GrayImage {
    let (h, w) = probs.dim();
    GrayImage::from_fn(w as u32, h as u32, |x, y| {
        if probs[[y as usize, x as usize]] > thresh {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// 8-connected foreground components, ordered by label.
fn components(mask: &GrayImage) -> Vec<Vec<(u32, u32)>> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let mut groups: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        if label[0] != 0 {
            groups.entry(label[0]).or_default().push((x, y));
        }
    }
    groups.into_values().collect()
}

fn mean_prob(probs: &ArrayView2<'_, f32>, pixels: &[(u32, u32)]) -> f32 {
    if pixels.is_empty() {
        return 0.0;
    }
    let sum: f32 = pixels
        .iter()
        .map(|&(x, y)| probs[[y as usize, x as usize]])
        .sum();
    sum / pixels.len() as f32
}

fn window_mean(probs: &ArrayView2<'_, f32>, (x, y): (u32, u32)) -> f32 {
    let (h, w) = probs.dim();
    let mut sum = 0.0;
    let mut n = 0;
    for dy in -SEPARATOR_WINDOW..=SEPARATOR_WINDOW {
        for dx in -SEPARATOR_WINDOW..=SEPARATOR_WINDOW {
            let (px, py) = (x as i64 + dx, y as i64 + dy);
            if px >= 0 && py >= 0 && (px as usize) < w && (py as usize) < h {
                sum += probs[[py as usize, px as usize]];
                n += 1;
            }
        }
    }
    if n == 0 { 0.0 } else { sum / n as f32 }
}

/// True when the separator channels put the start marker at the path's last
/// pixel rather than its first.
fn separator_says_reverse(
    start: &ArrayView2<'_, f32>,
    end: &ArrayView2<'_, f32>,
    path: &[(u32, u32)],
) -> bool {
    let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
        return false;
    };
    let forward = window_mean(start, first) + window_mean(end, last);
    let backward = window_mean(start, last) + window_mean(end, first);
    backward > forward
}

fn orient_by_direction(path: &mut [(u32, u32)], direction: TextDirection) {
    let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
        return;
    };
    let reverse = match direction {
        TextDirection::HorizontalLr => first.0 > last.0,
        TextDirection::HorizontalRl => first.0 < last.0,
        TextDirection::VerticalLr | TextDirection::VerticalRl => first.1 > last.1,
    };
    if reverse {
        path.reverse();
    }
}

/// Outer pixel corners of the leftmost and rightmost pixel on every row.
fn row_extremes(pixels: &[(u32, u32)], scale: &Scale) -> Vec<Point> {
    let mut rows: BTreeMap<u32, (u32, u32)> = BTreeMap::new();
    for &(x, y) in pixels {
        rows.entry(y)
            .and_modify(|(lo, hi)| {
                *lo = (*lo).min(x);
                *hi = (*hi).max(x);
            })
            .or_insert((x, x));
    }
    rows.into_iter()
        .flat_map(|(y, (lo, hi))| {
            [
                scale.corner(lo, y),
                scale.corner(lo, y + 1),
                scale.corner(hi + 1, y),
                scale.corner(hi + 1, y + 1),
            ]
        })
        .collect()
}
