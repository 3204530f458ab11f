//! Geometric output of page segmentation.

use crate::processors::geometry::{Polygon, Polyline, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Principal text direction of a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextDirection {
    /// Horizontal lines read left to right, stacked top to bottom.
    #[default]
    HorizontalLr,
    /// Horizontal lines read right to left, stacked top to bottom.
    HorizontalRl,
    /// Vertical lines read top to bottom, stacked left to right.
    VerticalLr,
    /// Vertical lines read top to bottom, stacked right to left.
    VerticalRl,
}

impl TextDirection {
    pub fn is_horizontal(&self) -> bool {
        matches!(self, Self::HorizontalLr | Self::HorizontalRl)
    }
}

/// Which line of the script the annotated polyline follows.
///
/// Hanging scripts (Devanagari, Bengali, Hebrew as often annotated) use a topline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselinePlacement {
    #[default]
    Baseline,
    Topline,
    Centerline,
}

impl BaselinePlacement {
    /// Fractions of the line height placed above and below the polyline.
    pub fn extents(&self) -> (f32, f32) {
        match self {
            Self::Baseline => (0.75, 0.25),
            Self::Topline => (0.15, 0.85),
            Self::Centerline => (0.5, 0.5),
        }
    }
}

/// Semantic type of a region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RegionType {
    Text,
    Image,
    Table,
    Marginalia,
    Heading,
    Other(String),
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionType::Text => write!(f, "text"),
            RegionType::Image => write!(f, "image"),
            RegionType::Table => write!(f, "table"),
            RegionType::Marginalia => write!(f, "marginalia"),
            RegionType::Heading => write!(f, "heading"),
            RegionType::Other(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for RegionType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "text" | "paragraph" | "textregion" => RegionType::Text,
            "image" | "illustration" | "graphic" => RegionType::Image,
            "table" => RegionType::Table,
            "marginalia" | "margin" => RegionType::Marginalia,
            "heading" | "title" => RegionType::Heading,
            _ => RegionType::Other(s.to_string()),
        })
    }
}

impl From<String> for RegionType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }
}

impl From<RegionType> for String {
    fn from(t: RegionType) -> Self {
        t.to_string()
    }
}

/// Meaning of one output channel of a segmentation network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ChannelKind {
    /// Marks the start of each baseline.
    StartSeparator,
    /// Marks the end of each baseline.
    EndSeparator,
    /// Baseline heatmap of the named line class.
    Baseline(String),
    /// Region mask of the given type.
    Region(RegionType),
}

/// Architecture metadata of a segmentation network, supplied with the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationDescriptor {
    /// Output channels in tensor order.
    pub channels: Vec<ChannelKind>,
    /// Page height the network expects; the page is scaled to it keeping aspect ratio.
    #[serde(default = "SegmentationDescriptor::default_input_height")]
    pub input_height: u32,
    /// 1 for grayscale input, 3 for RGB.
    #[serde(default = "SegmentationDescriptor::default_input_channels")]
    pub input_channels: u32,
}

impl SegmentationDescriptor {
    pub fn new(channels: Vec<ChannelKind>) -> Self {
        Self {
            channels,
            input_height: Self::default_input_height(),
            input_channels: Self::default_input_channels(),
        }
    }

    pub fn with_input_height(mut self, height: u32) -> Self {
        self.input_height = height;
        self
    }

    pub fn with_input_channels(mut self, channels: u32) -> Self {
        self.input_channels = channels;
        self
    }

    /// `(channel index, line class)` for every baseline channel.
    pub fn baseline_channels(&self) -> impl Iterator<Item = (usize, &str)> {
        self.channels.iter().enumerate().filter_map(|(i, c)| match c {
            ChannelKind::Baseline(name) => Some((i, name.as_str())),
            _ => None,
        })
    }

    /// `(channel index, region type)` for every region channel.
    pub fn region_channels(&self) -> impl Iterator<Item = (usize, &RegionType)> {
        self.channels.iter().enumerate().filter_map(|(i, c)| match c {
            ChannelKind::Region(t) => Some((i, t)),
            _ => None,
        })
    }

    pub fn has_region_classes(&self) -> bool {
        self.region_channels().next().is_some()
    }

    pub fn start_separator(&self) -> Option<usize> {
        self.channels
            .iter()
            .position(|c| matches!(c, ChannelKind::StartSeparator))
    }

    pub fn end_separator(&self) -> Option<usize> {
        self.channels
            .iter()
            .position(|c| matches!(c, ChannelKind::EndSeparator))
    }

    fn default_input_height() -> u32 {
        1800
    }

    fn default_input_channels() -> u32 {
        1
    }
}

/// A vectorized baseline before polygonization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineHypothesis {
    /// Line class from the channel it was found in.
    pub line_type: String,
    /// Points in writing order, page coordinates.
    pub points: Polyline,
    /// Mean heatmap probability along the skeleton.
    pub score: f32,
}

/// A region with its semantic type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionPolygon {
    /// Index of the region within its page.
    pub id: usize,
    pub region_type: RegionType,
    pub boundary: Polygon,
    /// Mean mask probability inside the component.
    pub score: f32,
}

impl RegionPolygon {
    pub fn bounding_rect(&self) -> Option<Rect> {
        self.boundary.bounding_rect()
    }
}

/// A text line ready for recognition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinePolygon {
    /// Index of the line within its page (extraction order, not reading order).
    pub id: usize,
    pub line_type: String,
    pub baseline: Polyline,
    pub boundary: Polygon,
    /// Containing region id, `None` for the implicit whole-page region.
    pub region: Option<usize>,
    pub score: f32,
}

impl LinePolygon {
    /// Bounding rectangle of the boundary, falling back to the baseline.
    pub fn bounding_rect(&self) -> Option<Rect> {
        self.boundary
            .bounding_rect()
            .or_else(|| self.baseline.bounding_rect())
    }
}

/// Anomalies recovered during vectorization and polygonization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SegmentationDiagnostics {
    /// Baselines outside every region, dropped.
    pub orphan_baselines: usize,
    /// Region hulls that were degenerate after clipping, dropped.
    pub dropped_regions: usize,
    /// Line polygons repaired by simplification or envelope fallback.
    pub repaired_polygons: usize,
    /// Line polygons that could not be repaired, dropped.
    pub dropped_polygons: usize,
}

/// Regions and lines of one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationResult {
    pub width: u32,
    pub height: u32,
    pub text_direction: TextDirection,
    pub regions: Vec<RegionPolygon>,
    pub lines: Vec<LinePolygon>,
    pub diagnostics: SegmentationDiagnostics,
}

impl SegmentationResult {
    /// An empty result for a page without text.
    pub fn empty(width: u32, height: u32, text_direction: TextDirection) -> Self {
        Self {
            width,
            height,
            text_direction,
            regions: Vec::new(),
            lines: Vec::new(),
            diagnostics: SegmentationDiagnostics::default(),
        }
    }

    /// True when no lines and no regions were found.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.regions.is_empty()
    }

    /// Lines assigned to `region` (`None` for the implicit page region).
    pub fn lines_in(&self, region: Option<usize>) -> impl Iterator<Item = &LinePolygon> {
        self.lines.iter().filter(move |l| l.region == region)
    }

    pub fn region(&self, id: usize) -> Option<&RegionPolygon> {
        self.regions.iter().find(|r| r.id == id)
    }
}
