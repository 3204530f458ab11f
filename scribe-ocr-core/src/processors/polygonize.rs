//! Line polygon construction from baselines.
//!
//! Each baseline is offset into a band whose height comes from the spacing of
//! neighbouring baselines in the same region. The band is split around the
//! annotated line according to [`BaselinePlacement`]. Bands that come out of
//! the offsetting degenerate or self-intersecting are repaired by simplifying
//! the baseline, then by the baseline's axis-aligned envelope, and dropped if
//! neither works.

use crate::core::config::{ConfigError, ConfigValidator};
use crate::domain::segmentation::{
    BaselineHypothesis, BaselinePlacement, LinePolygon, TextDirection,
};
use crate::processors::geometry::{GeometryError, Point, Polygon, Polyline, Rect};
use clipper2::{EndType, JoinType, Path as ClipperPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Line band construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonizerConfig {
    /// Which line of the text the baselines annotate.
    #[serde(default)]
    pub placement: BaselinePlacement,
    /// Line height as a fraction of the page extent when a region holds a
    /// single baseline (default: 0.03).
    #[serde(default = "PolygonizerConfig::default_fallback_height_ratio")]
    pub fallback_height_ratio: f32,
    /// Lower bound on the line height in pixels (default: 8).
    #[serde(default = "PolygonizerConfig::default_min_line_height")]
    pub min_line_height: f32,
    /// Upper bound on the line height in pixels (default: 400).
    #[serde(default = "PolygonizerConfig::default_max_line_height")]
    pub max_line_height: f32,
    /// Simplification tolerance of the output boundary (default: 0.5).
    #[serde(default = "PolygonizerConfig::default_boundary_tolerance")]
    pub boundary_tolerance: f32,
}

impl PolygonizerConfig {
    pub fn with_placement(mut self, placement: BaselinePlacement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_fallback_height_ratio(mut self, ratio: f32) -> Self {
        self.fallback_height_ratio = ratio;
        self
    }

    pub fn with_line_height_bounds(mut self, min: f32, max: f32) -> Self {
        self.min_line_height = min;
        self.max_line_height = max;
        self
    }

    fn default_fallback_height_ratio() -> f32 {
        0.03
    }

    fn default_min_line_height() -> f32 {
        8.0
    }

    fn default_max_line_height() -> f32 {
        400.0
    }

    fn default_boundary_tolerance() -> f32 {
        0.5
    }
}

impl Default for PolygonizerConfig {
    fn default() -> Self {
        Self {
            placement: BaselinePlacement::default(),
            fallback_height_ratio: Self::default_fallback_height_ratio(),
            min_line_height: Self::default_min_line_height(),
            max_line_height: Self::default_max_line_height(),
            boundary_tolerance: Self::default_boundary_tolerance(),
        }
    }
}

impl ConfigValidator for PolygonizerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_range(
            "fallback_height_ratio",
            self.fallback_height_ratio,
            f32::EPSILON,
            1.0,
        )?;
        self.validate_range("min_line_height", self.min_line_height, 1.0, f32::MAX)?;
        self.validate_range(
            "max_line_height",
            self.max_line_height,
            self.min_line_height,
            f32::MAX,
        )?;
        self.validate_range("boundary_tolerance", self.boundary_tolerance, 0.0, f32::MAX)
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Lines built from one page's baselines plus repair counts.
#[derive(Debug, Clone, Default)]
pub struct PolygonizeOutcome {
    pub lines: Vec<LinePolygon>,
    pub repaired: usize,
    pub dropped: usize,
}

/// Builds [`LinePolygon`]s around baselines.
#[derive(Debug, Clone, Default)]
pub struct LinePolygonizer {
    pub config: PolygonizerConfig,
}

impl LinePolygonizer {
    pub fn new(config: PolygonizerConfig) -> Self {
        Self { config }
    }

    /// Polygonizes baselines already assigned to regions.
    ///
    /// Line ids follow the input order, skipping dropped lines.
    pub fn polygonize(
        &self,
        baselines: &[(BaselineHypothesis, Option<usize>)],
        page: &Rect,
        direction: TextDirection,
    ) -> PolygonizeOutcome {
        let heights = self.region_line_heights(baselines, page, direction);
        let mut outcome = PolygonizeOutcome::default();

        for (baseline, region) in baselines {
            let height = heights
                .get(region)
                .copied()
                .unwrap_or_else(|| self.fallback_height(page, direction));
            match self.boundary(&baseline.points, height, page, direction) {
                Some((boundary, repaired)) => {
                    if repaired {
                        outcome.repaired += 1;
                    }
                    outcome.lines.push(LinePolygon {
                        id: outcome.lines.len(),
                        line_type: baseline.line_type.clone(),
                        baseline: baseline.points.clone(),
                        boundary,
                        region: *region,
                        score: baseline.score,
                    });
                }
                None => {
                    warn!(
                        "dropping line with {} baseline point(s): no valid boundary",
                        baseline.points.len()
                    );
                    outcome.dropped += 1;
                }
            }
        }
        outcome
    }

    /// Median spacing between neighbouring baselines of each region.
    fn region_line_heights(
        &self,
        baselines: &[(BaselineHypothesis, Option<usize>)],
        page: &Rect,
        direction: TextDirection,
    ) -> BTreeMap<Option<usize>, f32> {
        let mut positions: BTreeMap<Option<usize>, Vec<f32>> = BTreeMap::new();
        for (baseline, region) in baselines {
            if let Some(pos) = cross_position(&baseline.points, direction) {
                positions.entry(*region).or_default().push(pos);
            }
        }
        positions
            .into_iter()
            .map(|(region, positions)| {
                let height = median_gap(positions)
                    .unwrap_or_else(|| self.fallback_height(page, direction));
                (region, self.clamp_height(height))
            })
            .collect()
    }

    fn fallback_height(&self, page: &Rect, direction: TextDirection) -> f32 {
        let extent = if direction.is_horizontal() {
            page.height()
        } else {
            page.width()
        };
        self.clamp_height(extent * self.config.fallback_height_ratio)
    }

    fn clamp_height(&self, height: f32) -> f32 {
        height.clamp(self.config.min_line_height, self.config.max_line_height)
    }

    /// Builds a valid boundary, returning whether a repair step was needed.
    fn boundary(
        &self,
        baseline: &Polyline,
        height: f32,
        page: &Rect,
        direction: TextDirection,
    ) -> Option<(Polygon, bool)> {
        let baseline = baseline.dedup();
        if baseline.is_empty() {
            return None;
        }
        let (above, below) = self.config.placement.extents();

        match self.offset_band(&baseline, height, above, below, page, direction) {
            Ok(polygon) => return Some((polygon, false)),
            Err(e) => debug!("line band invalid: {e}, simplifying baseline"),
        }

        let coarse = baseline.simplify(height / 4.0);
        if let Ok(polygon) = self.offset_band(&coarse, height, above, below, page, direction) {
            return Some((polygon, true));
        }

        let envelope = envelope(&baseline, height, above, below, direction)?;
        let polygon = Polygon::from_rect(&envelope).clip_to_rect(page);
        polygon.validate().ok().map(|_| (polygon, true))
    }

    fn offset_band(
        &self,
        baseline: &Polyline,
        height: f32,
        above: f32,
        below: f32,
        page: &Rect,
        direction: TextDirection,
    ) -> Result<Polygon, GeometryError> {
        let shift = (below - above) / 2.0 * height;
        let half_width = (above + below) / 2.0 * height;
        let (dx, dy) = if direction.is_horizontal() {
            (0.0, shift)
        } else {
            (shift, 0.0)
        };

        let mut coords: Vec<(f64, f64)> = baseline
            .points
            .iter()
            .map(|p| ((p.x + dx) as f64, (p.y + dy) as f64))
            .collect();
        // A single point still gets a square band.
        if coords.len() == 1 {
            let (x, y) = coords[0];
            coords.push((x + 1.0, y));
        }
        let path: ClipperPath = coords.into();
        let bands = path.inflate(half_width as f64, JoinType::Round, EndType::Butt, 2.0);
        if bands.len() != 1 {
            return Err(GeometryError::Degenerate {
                points: bands.len(),
                area: 0.0,
            });
        }

        let mut points = Vec::new();
        for band in bands.into_iter() {
            points.extend(band.iter().map(|pt| Point::new(pt.x() as f32, pt.y() as f32)));
        }
        let polygon = Polygon::new(points)
            .dedup()
            .simplify(self.config.boundary_tolerance)
            .clip_to_rect(page);
        polygon.validate()?;
        Ok(polygon)
    }
}

/// Mean coordinate across the writing direction.
fn cross_position(baseline: &Polyline, direction: TextDirection) -> Option<f32> {
    if baseline.is_empty() {
        return None;
    }
    let sum: f32 = baseline
        .points
        .iter()
        .map(|p| if direction.is_horizontal() { p.y } else { p.x })
        .sum();
    Some(sum / baseline.len() as f32)
}

/// Median of the gaps between sorted positions, ignoring near-duplicates.
fn median_gap(mut positions: Vec<f32>) -> Option<f32> {
    positions.sort_by(f32::total_cmp);
    let mut gaps: Vec<f32> = positions
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|g| *g > 1.0)
        .collect();
    if gaps.is_empty() {
        return None;
    }
    gaps.sort_by(f32::total_cmp);
    Some(gaps[gaps.len() / 2])
}

fn envelope(
    baseline: &Polyline,
    height: f32,
    above: f32,
    below: f32,
    direction: TextDirection,
) -> Option<Rect> {
    let bbox = baseline.bounding_rect()?;
    let (up, down) = (above * height, below * height);
    let rect = if direction.is_horizontal() {
        Rect::new(bbox.x_min, bbox.y_min - up, bbox.x_max.max(bbox.x_min + 1.0), bbox.y_max + down)
    } else {
        Rect::new(bbox.x_min - up, bbox.y_min, bbox.x_max + down, bbox.y_max.max(bbox.y_min + 1.0))
    };
    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hypothesis(points: &[(f32, f32)]) -> BaselineHypothesis {
        BaselineHypothesis {
            line_type: "default".to_string(),
            points: Polyline::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect()),
            score: 0.9,
        }
    }

    fn page() -> Rect {
        Rect::from_size(400, 300)
    }

    #[test]
    fn test_median_gap() {
        assert_eq!(median_gap(vec![100.0, 40.0, 70.0, 160.0]), Some(30.0));
        assert_eq!(median_gap(vec![50.0]), None);
        assert_eq!(median_gap(vec![50.0, 50.5]), None);
    }

    #[test]
    fn test_band_follows_baseline_placement() {
        let baselines = vec![
            (hypothesis(&[(20.0, 100.0), (380.0, 100.0)]), Some(0)),
            (hypothesis(&[(20.0, 140.0), (380.0, 140.0)]), Some(0)),
        ];
        let polygonizer = LinePolygonizer::default();
        let outcome = polygonizer.polygonize(&baselines, &page(), TextDirection::HorizontalLr);
        assert_eq!(outcome.lines.len(), 2);
        assert_eq!(outcome.dropped, 0);

        // Height 40, 75% above and 25% below the baseline.
        let rect = outcome.lines[0].boundary.bounding_rect().unwrap();
        assert!((rect.y_min - 70.0).abs() < 0.5, "{rect:?}");
        assert!((rect.y_max - 110.0).abs() < 0.5, "{rect:?}");
        assert!((rect.x_min - 20.0).abs() < 0.5);
        assert!((rect.x_max - 380.0).abs() < 0.5);
        assert_eq!(outcome.lines[1].id, 1);
        assert_eq!(outcome.lines[1].region, Some(0));
    }

    #[test]
    fn test_topline_places_band_below() {
        let baselines = vec![
            (hypothesis(&[(20.0, 100.0), (380.0, 100.0)]), None),
            (hypothesis(&[(20.0, 140.0), (380.0, 140.0)]), None),
        ];
        let polygonizer =
            LinePolygonizer::new(PolygonizerConfig::default().with_placement(BaselinePlacement::Topline));
        let outcome = polygonizer.polygonize(&baselines, &page(), TextDirection::HorizontalLr);
        let rect = outcome.lines[0].boundary.bounding_rect().unwrap();
        assert!((rect.y_min - 94.0).abs() < 0.5, "{rect:?}");
        assert!((rect.y_max - 134.0).abs() < 0.5, "{rect:?}");
    }

    #[test]
    fn test_single_line_uses_fallback_height() {
        let baselines = vec![(hypothesis(&[(20.0, 150.0), (200.0, 150.0)]), None)];
        let polygonizer =
            LinePolygonizer::new(PolygonizerConfig::default().with_placement(BaselinePlacement::Centerline));
        let outcome = polygonizer.polygonize(&baselines, &page(), TextDirection::HorizontalLr);
        // 300 * 0.03 = 9 px, centred on the line.
        let rect = outcome.lines[0].boundary.bounding_rect().unwrap();
        assert!((rect.height() - 9.0).abs() < 0.5, "{rect:?}");
    }

    #[test]
    fn test_boundary_clipped_to_page() {
        let baselines = vec![(hypothesis(&[(0.0, 5.0), (400.0, 5.0)]), None)];
        let polygonizer = LinePolygonizer::new(
            PolygonizerConfig::default().with_line_height_bounds(40.0, 40.0),
        );
        let outcome = polygonizer.polygonize(&baselines, &page(), TextDirection::HorizontalLr);
        let rect = outcome.lines[0].boundary.bounding_rect().unwrap();
        assert!(rect.y_min >= 0.0 && rect.x_min >= 0.0 && rect.x_max <= 400.0);
    }

    #[test]
    fn test_line_outside_page_dropped() {
        let baselines = vec![(hypothesis(&[(500.0, 500.0), (600.0, 500.0)]), None)];
        let outcome =
            LinePolygonizer::default().polygonize(&baselines, &page(), TextDirection::HorizontalLr);
        assert!(outcome.lines.is_empty());
        assert_eq!(outcome.dropped, 1);
    }

    #[test]
    fn test_zigzag_baseline_yields_valid_boundary() {
        let points: Vec<(f32, f32)> = (0..30)
            .map(|i| (20.0 + i as f32 * 2.0, if i % 2 == 0 { 150.0 } else { 153.0 }))
            .collect();
        let baselines = vec![(hypothesis(&points), None)];
        let outcome =
            LinePolygonizer::default().polygonize(&baselines, &page(), TextDirection::HorizontalLr);
        assert_eq!(outcome.lines.len(), 1);
        assert!(outcome.lines[0].boundary.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(PolygonizerConfig::default().validate().is_ok());
        assert!(
            PolygonizerConfig::default()
                .with_line_height_bounds(50.0, 10.0)
                .validate()
                .is_err()
        );
    }
}
