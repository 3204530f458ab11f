//! Page segmentation: page raster in, regions and line polygons out.
//!
//! The page is scaled to the network's input height and run through the
//! model. The heatmaps are then vectorized, filtered by class, clipped to the
//! page, and every baseline is assigned to one region before the line
//! polygons are built. A page without confident detections gives an empty
//! result, not an error.

use crate::core::config::{ConfigError, ConfigValidator};
use crate::core::traits::SegmentationModel;
use crate::core::{OCRError, OcrResult};
use crate::domain::page::PageImage;
use crate::domain::segmentation::{
    BaselineHypothesis, RegionPolygon, RegionType, SegmentationDescriptor,
    SegmentationDiagnostics, SegmentationResult, TextDirection,
};
use crate::processors::geometry::Rect;
use crate::processors::polygonize::{LinePolygonizer, PolygonizerConfig};
use crate::processors::vectorize::{HeatmapVectorizer, RegionCandidate, VectorizeConfig};
use crate::utils::image::resize_page_to_height;
use crate::utils::page_to_tensor;
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Spacing of the points sampled along a baseline for region assignment.
const ASSIGNMENT_STEP: f32 = 2.0;

/// Segmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default)]
    pub vectorize: VectorizeConfig,
    #[serde(default)]
    pub polygonizer: PolygonizerConfig,
    #[serde(default)]
    pub text_direction: TextDirection,
    /// Only these line classes are kept. `None` keeps all.
    #[serde(default)]
    pub valid_baselines: Option<BTreeSet<String>>,
    /// Only these region types are kept. `None` keeps all.
    #[serde(default)]
    pub valid_regions: Option<BTreeSet<RegionType>>,
    /// Renames line classes after filtering.
    #[serde(default)]
    pub merge_baselines: BTreeMap<String, String>,
    /// Retypes regions after filtering.
    #[serde(default)]
    pub merge_regions: BTreeMap<RegionType, RegionType>,
    /// Drop every baseline.
    #[serde(default)]
    pub suppress_baselines: bool,
    /// Drop every region; lines fall into the implicit page region.
    #[serde(default)]
    pub suppress_regions: bool,
    /// Fraction of a baseline that must lie inside a region for it to be
    /// assigned there (default: 0.5).
    #[serde(default = "SegmentationConfig::default_min_region_coverage")]
    pub min_region_coverage: f32,
}

impl SegmentationConfig {
    pub fn with_vectorize(mut self, vectorize: VectorizeConfig) -> Self {
        self.vectorize = vectorize;
        self
    }

    pub fn with_polygonizer(mut self, polygonizer: PolygonizerConfig) -> Self {
        self.polygonizer = polygonizer;
        self
    }

    pub fn with_text_direction(mut self, direction: TextDirection) -> Self {
        self.text_direction = direction;
        self
    }

    pub fn with_valid_baselines<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_baselines = Some(classes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_valid_regions<I>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = RegionType>,
    {
        self.valid_regions = Some(types.into_iter().collect());
        self
    }

    pub fn with_merged_baseline(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.merge_baselines.insert(from.into(), to.into());
        self
    }

    pub fn with_merged_region(mut self, from: RegionType, to: RegionType) -> Self {
        self.merge_regions.insert(from, to);
        self
    }

    pub fn with_suppressed_baselines(mut self, suppress: bool) -> Self {
        self.suppress_baselines = suppress;
        self
    }

    pub fn with_suppressed_regions(mut self, suppress: bool) -> Self {
        self.suppress_regions = suppress;
        self
    }

    fn default_min_region_coverage() -> f32 {
        0.5
    }

    fn keeps_baseline(&self, line_type: &str) -> bool {
        !self.suppress_baselines
            && self
                .valid_baselines
                .as_ref()
                .is_none_or(|valid| valid.contains(line_type))
    }

    fn keeps_region(&self, region_type: &RegionType) -> bool {
        !self.suppress_regions
            && self
                .valid_regions
                .as_ref()
                .is_none_or(|valid| valid.contains(region_type))
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            vectorize: VectorizeConfig::default(),
            polygonizer: PolygonizerConfig::default(),
            text_direction: TextDirection::default(),
            valid_baselines: None,
            valid_regions: None,
            merge_baselines: BTreeMap::new(),
            merge_regions: BTreeMap::new(),
            suppress_baselines: false,
            suppress_regions: false,
            min_region_coverage: Self::default_min_region_coverage(),
        }
    }
}

impl ConfigValidator for SegmentationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.vectorize.validate()?;
        self.polygonizer.validate()?;
        self.validate_range("min_region_coverage", self.min_region_coverage, 0.0, 1.0)
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Segments a page into regions and text lines.
///
/// # Errors
///
/// Fails for an empty raster, a model error, or a heatmap whose channel count
/// differs from the model's descriptor.
pub fn segment(
    page: &PageImage,
    model: &dyn SegmentationModel,
    config: &SegmentationConfig,
) -> OcrResult<SegmentationResult> {
    let descriptor = model.descriptor();
    let scaled = resize_page_to_height(page.as_dynamic(), descriptor.input_height)?;
    let input = page_to_tensor(&scaled, descriptor.input_channels)?;
    let heatmap = model.forward(&input)?;
    if heatmap.dim().0 != descriptor.channels.len() {
        return Err(OCRError::invalid_input(format!(
            "segmentation model '{}' returned {} channels, descriptor declares {}",
            model.info().model_name,
            heatmap.dim().0,
            descriptor.channels.len()
        )));
    }
    let result = segment_heatmap(&heatmap, descriptor, (page.width(), page.height()), config);
    info!(
        "Segmented {}x{} page: {} region(s), {} line(s)",
        page.width(),
        page.height(),
        result.regions.len(),
        result.lines.len()
    );
    Ok(result)
}

/// Turns per-channel probabilities into a [`SegmentationResult`] for a page of
/// `page_size` pixels.
pub fn segment_heatmap(
    heatmap: &Array3<f32>,
    descriptor: &SegmentationDescriptor,
    page_size: (u32, u32),
    config: &SegmentationConfig,
) -> SegmentationResult {
    let (width, height) = page_size;
    let direction = config.text_direction;
    let bounds = Rect::from_size(width, height);
    let vectorizer = HeatmapVectorizer::new(config.vectorize.clone());
    let mut diagnostics = SegmentationDiagnostics::default();

    let baselines: Vec<BaselineHypothesis> = vectorizer
        .baselines(heatmap, descriptor, direction, page_size)
        .into_iter()
        .filter(|b| config.keeps_baseline(&b.line_type))
        .map(|mut b| {
            if let Some(merged) = config.merge_baselines.get(&b.line_type) {
                b.line_type = merged.clone();
            }
            b
        })
        .collect();

    let use_regions = descriptor.has_region_classes() && !config.suppress_regions;
    let regions = if use_regions {
        let candidates = vectorizer
            .regions(heatmap, descriptor, page_size)
            .into_iter()
            .filter(|c| config.keeps_region(&c.region_type))
            .collect();
        clip_regions(candidates, &bounds, config, &mut diagnostics)
    } else {
        Vec::new()
    };

    let mut assigned = Vec::with_capacity(baselines.len());
    for baseline in baselines {
        let region = if use_regions {
            match assign_region(&baseline, &regions, config.min_region_coverage) {
                Some(id) => Some(id),
                None => {
                    warn!(
                        "dropping orphan {} baseline with {} point(s): not inside any region",
                        baseline.line_type,
                        baseline.points.len()
                    );
                    diagnostics.orphan_baselines += 1;
                    continue;
                }
            }
        } else {
            None
        };
        assigned.push((baseline, region));
    }

    let outcome =
        LinePolygonizer::new(config.polygonizer.clone()).polygonize(&assigned, &bounds, direction);
    diagnostics.repaired_polygons = outcome.repaired;
    diagnostics.dropped_polygons = outcome.dropped;

    debug!("segmentation diagnostics: {:?}", diagnostics);
    SegmentationResult {
        width,
        height,
        text_direction: direction,
        regions,
        lines: outcome.lines,
        diagnostics,
    }
}

/// Clips region hulls to the page, drops the degenerate ones and assigns ids.
fn clip_regions(
    candidates: Vec<RegionCandidate>,
    bounds: &Rect,
    config: &SegmentationConfig,
    diagnostics: &mut SegmentationDiagnostics,
) -> Vec<RegionPolygon> {
    let mut regions = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let boundary = candidate.hull.clip_to_rect(bounds);
        if let Err(e) = boundary.validate() {
            warn!("dropping {} region: {}", candidate.region_type, e);
            diagnostics.dropped_regions += 1;
            continue;
        }
        let region_type = config
            .merge_regions
            .get(&candidate.region_type)
            .cloned()
            .unwrap_or(candidate.region_type);
        regions.push(RegionPolygon {
            id: regions.len(),
            region_type,
            boundary,
            score: candidate.score,
        });
    }
    regions
}

/// The smallest region holding enough of the baseline, lower id on ties.
fn assign_region(
    baseline: &BaselineHypothesis,
    regions: &[RegionPolygon],
    min_coverage: f32,
) -> Option<usize> {
    let samples = baseline.points.densify(ASSIGNMENT_STEP);
    regions
        .iter()
        .filter(|r| r.boundary.coverage_of(&samples) >= min_coverage)
        .min_by(|a, b| {
            a.boundary
                .area()
                .total_cmp(&b.boundary.area())
                .then(a.id.cmp(&b.id))
        })
        .map(|r| r.id)
}
