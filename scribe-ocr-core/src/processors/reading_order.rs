//! Reading order of regions and lines.
//!
//! Geometry is mapped into a canonical frame in which lines run left to right
//! and are stacked top to bottom, so one set of rules covers every
//! [`TextDirection`]. In that frame two units are related by:
//!
//! 1. containment: a unit precedes the units it contains;
//! 2. x-overlap: the upper unit precedes the lower one;
//! 3. otherwise the left unit precedes the right one, unless a third unit lies
//!    vertically between them and horizontally overlaps both (a spanning
//!    separator such as a full-width heading between column blocks).
//!
//! Regions are ordered first, then the lines inside each region. A learned
//! [`PairwiseOrderModel`] may add or override line edges depending on the
//! [`OrderPolicy`]. Edges are inserted one at a time against a transitive
//! closure; an edge that would close a cycle is replaced by the geometric edge
//! for that pair or dropped, so the graph stays acyclic.

use crate::core::config::{ConfigError, ConfigValidator};
use crate::core::traits::PairwiseOrderModel;
use crate::domain::segmentation::{LinePolygon, SegmentationResult, TextDirection};
use crate::processors::geometry::Rect;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, warn};

/// How learned pairwise preferences combine with geometric edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPolicy {
    /// Ignore any order model.
    GeometryOnly,
    /// Geometric edges win; learned edges only fill pairs geometry leaves open.
    #[default]
    GeometryFirst,
    /// Confident learned edges replace geometric ones unless they close a cycle.
    LearnedOverride,
}

/// Reading order settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingOrderConfig {
    #[serde(default)]
    pub policy: OrderPolicy,
    /// A learned preference counts when its probability is at least this far
    /// from undecided in either direction (default: 0.5, i.e. any preference).
    #[serde(default = "ReadingOrderConfig::default_min_confidence")]
    pub min_confidence: f32,
}

impl ReadingOrderConfig {
    pub fn with_policy(mut self, policy: OrderPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_min_confidence(mut self, confidence: f32) -> Self {
        self.min_confidence = confidence;
        self
    }

    fn default_min_confidence() -> f32 {
        0.5
    }

    /// Maps a probability that `a` precedes `b` to an edge direction.
    fn learned_direction(&self, p: f32) -> Option<bool> {
        if !p.is_finite() {
            return None;
        }
        if p > self.min_confidence.max(0.5) {
            Some(true)
        } else if p < 1.0 - self.min_confidence.max(0.5) {
            Some(false)
        } else {
            None
        }
    }
}

impl Default for ReadingOrderConfig {
    fn default() -> Self {
        Self {
            policy: OrderPolicy::default(),
            min_confidence: Self::default_min_confidence(),
        }
    }
}

impl ConfigValidator for ReadingOrderConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_range("min_confidence", self.min_confidence, 0.5, 1.0)
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Internal ordering anomaly. Recovered where it is detected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderingError {
    #[error("edge {from} -> {to} would close a cycle")]
    Cycle { from: usize, to: usize },
}

/// Normalized geometry of an ordered pair, the input of a pairwise order model.
///
/// Layout: centre x, centre y, width, height of the first unit, the same for
/// the second, then centre dx and dy, x-overlap and y-overlap flags. Positions
/// are divided by the page size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderFeatures {
    pub values: [f32; OrderFeatures::LEN],
}

impl OrderFeatures {
    pub const LEN: usize = 12;

    pub fn between(first: &Rect, second: &Rect, page: &Rect) -> Self {
        let (pw, ph) = (page.width().max(1.0), page.height().max(1.0));
        let (a, b) = (first.center(), second.center());
        let y_overlaps = first.y_min.max(second.y_min) < first.y_max.min(second.y_max);
        Self {
            values: [
                a.x / pw,
                a.y / ph,
                first.width() / pw,
                first.height() / ph,
                b.x / pw,
                b.y / ph,
                second.width() / pw,
                second.height() / ph,
                (b.x - a.x) / pw,
                (b.y - a.y) / ph,
                f32::from(u8::from(first.x_overlaps(second))),
                f32::from(u8::from(y_overlaps)),
            ],
        }
    }
}

/// A node of the reading order graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OrderNode {
    Region(usize),
    /// The implicit whole-page region holding lines without a region.
    Page,
    Line(usize),
}

/// Precedence graph over regions and lines with its canonical linearization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingOrderGraph {
    pub nodes: Vec<OrderNode>,
    /// `(a, b)`: node `a` is read before node `b`.
    pub edges: Vec<(usize, usize)>,
    /// Node indices in reading order.
    pub order: Vec<usize>,
    /// Edges that would have closed a cycle and were replaced or dropped.
    pub conflicts: usize,
    /// Whether the topological sort failed and the pure geometric order was used.
    pub fallback_used: bool,
}

impl ReadingOrderGraph {
    /// Line ids in reading order.
    pub fn line_order(&self) -> Vec<usize> {
        self.order
            .iter()
            .filter_map(|&n| match self.nodes[n] {
                OrderNode::Line(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Region ids in reading order, without the implicit page region.
    pub fn region_order(&self) -> Vec<usize> {
        self.order
            .iter()
            .filter_map(|&n| match self.nodes[n] {
                OrderNode::Region(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Whether `order` is a permutation of the nodes respecting every edge.
    pub fn is_valid_linearization(&self) -> bool {
        if self.order.len() != self.nodes.len() {
            return false;
        }
        let mut position = vec![usize::MAX; self.nodes.len()];
        for (pos, &node) in self.order.iter().enumerate() {
            if node >= position.len() || position[node] != usize::MAX {
                return false;
            }
            position[node] = pos;
        }
        self.edges.iter().all(|&(a, b)| position[a] < position[b])
    }
}

/// Orders the regions and lines of a segmented page.
///
/// Never fails: a failing order model is ignored with a warning and ordering
/// anomalies fall back to geometry.
pub fn read_order(
    segmentation: &SegmentationResult,
    model: Option<&dyn PairwiseOrderModel>,
    config: &ReadingOrderConfig,
) -> ReadingOrderGraph {
    let direction = segmentation.text_direction;
    let page = Rect::from_size(segmentation.width, segmentation.height);
    let model = match config.policy {
        OrderPolicy::GeometryOnly => None,
        _ => model,
    };

    // Region level units: every region, plus the implicit page region when
    // some lines have no region.
    let mut groups: BTreeMap<Option<usize>, Vec<&LinePolygon>> = BTreeMap::new();
    for line in &segmentation.lines {
        groups.entry(line.region).or_default().push(line);
    }
    let mut units: Vec<(OrderNode, Rect, Option<usize>)> = segmentation
        .regions
        .iter()
        .filter_map(|r| Some((OrderNode::Region(r.id), r.bounding_rect()?, Some(r.id))))
        .collect();
    if let Some(page_lines) = groups.get(&None) {
        let rect = page_lines
            .iter()
            .filter_map(|l| l.bounding_rect())
            .reduce(|a, b| a.union(&b))
            .unwrap_or(page);
        units.push((OrderNode::Page, rect, None));
    }

    let unit_rects: Vec<Rect> = units.iter().map(|(_, r, _)| canonical(r, direction, &page)).collect();
    let unit_order = order_units(&unit_rects, |_, _| None, OrderPolicy::GeometryOnly);

    let mut nodes: Vec<OrderNode> = units.iter().map(|(n, _, _)| *n).collect();
    let mut edges = unit_order.edges.clone();
    let mut order = Vec::with_capacity(nodes.len() + segmentation.lines.len());
    let mut conflicts = unit_order.conflicts;
    let mut fallback_used = unit_order.fallback_used;
    let model_failed = Cell::new(false);

    for &u in &unit_order.order {
        order.push(u);
        let Some(lines) = groups.get(&units[u].2) else {
            continue;
        };
        let page_rects: Vec<Rect> = lines
            .iter()
            .map(|l| l.bounding_rect().unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0)))
            .collect();
        let rects: Vec<Rect> = page_rects.iter().map(|r| canonical(r, direction, &page)).collect();

        let learned = |i: usize, j: usize| -> Option<bool> {
            let model = model?;
            if model_failed.get() {
                return None;
            }
            let features = OrderFeatures::between(&page_rects[i], &page_rects[j], &page);
            match model.precedes(&features) {
                Ok(p) => config.learned_direction(p),
                Err(e) => {
                    warn!("order model {} failed, using geometry: {e}", model.info().model_name);
                    model_failed.set(true);
                    None
                }
            }
        };
        let line_order = order_units(&rects, learned, config.policy);
        conflicts += line_order.conflicts;
        fallback_used |= line_order.fallback_used;

        let base = nodes.len();
        nodes.extend(lines.iter().map(|l| OrderNode::Line(l.id)));
        edges.extend(line_order.edges.iter().map(|&(a, b)| (base + a, base + b)));
        edges.extend((0..lines.len()).map(|i| (u, base + i)));
        order.extend(line_order.order.iter().map(|&i| base + i));
    }

    debug!(
        "reading order: {} unit(s), {} line(s), {} edge(s), {} conflict(s)",
        units.len(),
        segmentation.lines.len(),
        edges.len(),
        conflicts
    );
    ReadingOrderGraph {
        nodes,
        edges,
        order,
        conflicts,
        fallback_used,
    }
}

/// Orders a flat list of lines as if they shared one region.
pub fn order_lines(lines: &[LinePolygon], direction: TextDirection, page: &Rect) -> Vec<usize> {
    let rects: Vec<Rect> = lines
        .iter()
        .map(|l| canonical(&l.bounding_rect().unwrap_or(*page), direction, page))
        .collect();
    order_units(&rects, |_, _| None, OrderPolicy::GeometryOnly)
        .order
        .into_iter()
        .map(|i| lines[i].id)
        .collect()
}

/// Maps a page rectangle into the canonical left-to-right, top-to-bottom frame.
fn canonical(rect: &Rect, direction: TextDirection, page: &Rect) -> Rect {
    match direction {
        TextDirection::HorizontalLr => *rect,
        TextDirection::HorizontalRl => {
            Rect::new(page.x_max - rect.x_max, rect.y_min, page.x_max - rect.x_min, rect.y_max)
        }
        TextDirection::VerticalLr => Rect::new(rect.y_min, rect.x_min, rect.y_max, rect.x_max),
        TextDirection::VerticalRl => {
            Rect::new(rect.y_min, page.x_max - rect.x_max, rect.y_max, page.x_max - rect.x_min)
        }
    }
}

/// Geometric precedence of `i` over `j`: `Some(true)` when `i` comes first.
fn geometric_relation(rects: &[Rect], i: usize, j: usize) -> Option<bool> {
    let (a, b) = (&rects[i], &rects[j]);
    if a != b {
        if a.contains_rect(b) {
            return Some(true);
        }
        if b.contains_rect(a) {
            return Some(false);
        }
    }
    if a.x_overlaps(b) {
        let (ca, cb) = (a.center(), b.center());
        return match ca.y.total_cmp(&cb.y).then(ca.x.total_cmp(&cb.x)) {
            std::cmp::Ordering::Less => Some(true),
            std::cmp::Ordering::Greater => Some(false),
            std::cmp::Ordering::Equal => None,
        };
    }
    if a.x_max <= b.x_min {
        return (!separated(rects, i, j)).then_some(true);
    }
    if b.x_max <= a.x_min {
        return (!separated(rects, j, i)).then_some(false);
    }
    None
}

/// Whether some third unit lies vertically between `i` and `j` and overlaps
/// both horizontally.
fn separated(rects: &[Rect], i: usize, j: usize) -> bool {
    let (a, b) = (&rects[i], &rects[j]);
    let (lo, hi) = {
        let (ya, yb) = (a.center().y, b.center().y);
        (ya.min(yb), ya.max(yb))
    };
    rects.iter().enumerate().any(|(k, w)| {
        if k == i || k == j {
            return false;
        }
        let y = w.center().y;
        y > lo && y < hi && w.x_overlaps(a) && w.x_overlaps(b)
    })
}

/// Transitive closure as a bit matrix.
struct Closure {
    words: usize,
    bits: Vec<u64>,
}

impl Closure {
    fn new(n: usize) -> Self {
        let words = n.div_ceil(64).max(1);
        Self {
            words,
            bits: vec![0; words * n],
        }
    }

    fn reaches(&self, a: usize, b: usize) -> bool {
        self.bits[a * self.words + b / 64] & (1 << (b % 64)) != 0
    }

    /// Adds `from -> to`, refusing edges that close a cycle.
    fn insert(&mut self, from: usize, to: usize) -> Result<bool, OrderingError> {
        if from == to || self.reaches(to, from) {
            return Err(OrderingError::Cycle { from, to });
        }
        if self.reaches(from, to) {
            return Ok(false);
        }
        let n = self.bits.len() / self.words;
        let mut target: Vec<u64> = self.bits[to * self.words..(to + 1) * self.words].to_vec();
        target[to / 64] |= 1 << (to % 64);
        for a in 0..n {
            if a == from || self.reaches(a, from) {
                let row = &mut self.bits[a * self.words..(a + 1) * self.words];
                for (dst, src) in row.iter_mut().zip(&target) {
                    *dst |= src;
                }
            }
        }
        Ok(true)
    }
}

struct UnitOrder {
    edges: Vec<(usize, usize)>,
    order: Vec<usize>,
    conflicts: usize,
    fallback_used: bool,
}

/// Builds the precedence edges of `rects` and linearizes them.
///
/// `learned(i, j)` is the learned preference of `i` over `j`, if any.
fn order_units<F>(rects: &[Rect], mut learned: F, policy: OrderPolicy) -> UnitOrder
where
    F: FnMut(usize, usize) -> Option<bool>,
{
    let n = rects.len();
    let rank = geometric_rank(rects);
    let mut by_rank: Vec<usize> = (0..n).collect();
    by_rank.sort_by_key(|&i| rank[i]);

    let mut closure = Closure::new(n);
    let mut edges = Vec::new();
    let mut conflicts = 0;

    for (pi, &i) in by_rank.iter().enumerate() {
        for &j in &by_rank[pi + 1..] {
            let geometric = geometric_relation(rects, i, j);
            let chosen = match policy {
                OrderPolicy::GeometryOnly => geometric,
                OrderPolicy::GeometryFirst => geometric.or_else(|| learned(i, j)),
                OrderPolicy::LearnedOverride => learned(i, j).or(geometric),
            };
            let Some(i_first) = chosen else {
                continue;
            };
            let (from, to) = if i_first { (i, j) } else { (j, i) };
            match closure.insert(from, to) {
                Ok(_) => edges.push((from, to)),
                Err(e) => {
                    debug!("{e}, resolving geometrically");
                    conflicts += 1;
                    if let Some(g) = geometric.filter(|&g| g != i_first) {
                        let (from, to) = if g { (i, j) } else { (j, i) };
                        if closure.insert(from, to).is_ok() {
                            edges.push((from, to));
                        }
                    }
                }
            }
        }
    }

    match topological_sort(n, &edges, &rank) {
        Some(order) => UnitOrder {
            edges,
            order,
            conflicts,
            fallback_used: false,
        },
        None => {
            debug!("precedence graph is cyclic, using pure geometric order");
            let chain = by_rank.windows(2).map(|w| (w[0], w[1])).collect();
            UnitOrder {
                edges: chain,
                order: by_rank,
                conflicts,
                fallback_used: true,
            }
        }
    }
}

/// Rank of each unit under the tie-break rule: top edge, then leading edge.
fn geometric_rank(rects: &[Rect]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..rects.len()).collect();
    idx.sort_by(|&a, &b| {
        rects[a]
            .y_min
            .total_cmp(&rects[b].y_min)
            .then(rects[a].x_min.total_cmp(&rects[b].x_min))
            .then(a.cmp(&b))
    });
    let mut rank = vec![0; rects.len()];
    for (r, i) in idx.into_iter().enumerate() {
        rank[i] = r;
    }
    rank
}

/// Kahn's algorithm, always releasing the ready unit of lowest rank.
fn topological_sort(n: usize, edges: &[(usize, usize)], rank: &[usize]) -> Option<Vec<usize>> {
    let mut indegree = vec![0usize; n];
    let mut successors = vec![Vec::new(); n];
    for &(a, b) in edges {
        indegree[b] += 1;
        successors[a].push(b);
    }
    let mut ready: BTreeSet<(usize, usize)> = (0..n)
        .filter(|&i| indegree[i] == 0)
        .map(|i| (rank[i], i))
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some((_, i)) = ready.pop_first() {
        order.push(i);
        for &s in &successors[i] {
            indegree[s] -= 1;
            if indegree[s] == 0 {
                ready.insert((rank[s], s));
            }
        }
    }
    (order.len() == n).then_some(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OCRError;
    use crate::core::traits::{ModelInfo, ModelKind};
    use crate::domain::segmentation::{RegionPolygon, RegionType, SegmentationDiagnostics};
    use crate::processors::geometry::{Point, Polygon, Polyline};

    fn line(id: usize, region: Option<usize>, x0: f32, y0: f32, x1: f32, y1: f32) -> LinePolygon {
        let rect = Rect::new(x0, y0, x1, y1);
        LinePolygon {
            id,
            line_type: "default".to_string(),
            baseline: Polyline::new(vec![Point::new(x0, y1), Point::new(x1, y1)]),
            boundary: Polygon::from_rect(&rect),
            region,
            score: 1.0,
        }
    }

    fn region(id: usize, x0: f32, y0: f32, x1: f32, y1: f32) -> RegionPolygon {
        RegionPolygon {
            id,
            region_type: RegionType::Text,
            boundary: Polygon::from_rect(&Rect::new(x0, y0, x1, y1)),
            score: 1.0,
        }
    }

    fn page(lines: Vec<LinePolygon>, regions: Vec<RegionPolygon>, dir: TextDirection) -> SegmentationResult {
        SegmentationResult {
            width: 1000,
            height: 1000,
            text_direction: dir,
            regions,
            lines,
            diagnostics: SegmentationDiagnostics::default(),
        }
    }

    #[test]
    fn test_stacked_lines_top_to_bottom_regardless_of_input_order() {
        let lines = vec![
            line(0, None, 100.0, 300.0, 900.0, 340.0),
            line(1, None, 100.0, 100.0, 900.0, 140.0),
            line(2, None, 100.0, 200.0, 900.0, 240.0),
        ];
        let graph = read_order(
            &page(lines, vec![], TextDirection::HorizontalLr),
            None,
            &ReadingOrderConfig::default(),
        );
        assert_eq!(graph.line_order(), vec![1, 2, 0]);
        assert!(graph.is_valid_linearization());
        assert!(!graph.fallback_used);
    }

    #[test]
    fn test_stacked_lines_without_overlap() {
        // Three short lines stacked with no horizontal overlap between them.
        let lines = vec![
            line(0, None, 500.0, 300.0, 600.0, 340.0),
            line(1, None, 100.0, 100.0, 200.0, 140.0),
            line(2, None, 300.0, 200.0, 400.0, 240.0),
        ];
        let order = order_lines(&lines, TextDirection::HorizontalLr, &Rect::from_size(1000, 1000));
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_overlapping_lines_read_top_first_even_when_lower_starts_left() {
        // Each lower line starts further left than the one above it.
        let lines = vec![
            line(0, None, 50.0, 300.0, 800.0, 340.0),
            line(1, None, 400.0, 100.0, 900.0, 140.0),
            line(2, None, 100.0, 200.0, 700.0, 240.0),
        ];
        let bounds = Rect::from_size(1000, 1000);
        assert_eq!(order_lines(&lines, TextDirection::HorizontalLr, &bounds), vec![1, 2, 0]);
        assert_eq!(order_lines(&lines, TextDirection::HorizontalRl, &bounds), vec![1, 2, 0]);
    }

    #[test]
    fn test_two_columns_read_column_by_column() {
        let mut lines = Vec::new();
        for k in 0..3 {
            let y = 100.0 + 100.0 * k as f32;
            lines.push(line(k, None, 550.0, y, 900.0, y + 40.0));
            lines.push(line(10 + k, None, 100.0, y, 450.0, y + 40.0));
        }
        let order = order_lines(&lines, TextDirection::HorizontalLr, &Rect::from_size(1000, 1000));
        assert_eq!(order, vec![10, 11, 12, 0, 1, 2]);

        let rtl = order_lines(&lines, TextDirection::HorizontalRl, &Rect::from_size(1000, 1000));
        assert_eq!(rtl, vec![0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn test_spanning_line_separates_column_blocks() {
        let lines = vec![
            line(0, None, 100.0, 100.0, 450.0, 140.0),
            line(1, None, 550.0, 100.0, 900.0, 140.0),
            line(2, None, 100.0, 200.0, 900.0, 240.0),
            line(3, None, 100.0, 300.0, 450.0, 340.0),
            line(4, None, 550.0, 300.0, 900.0, 340.0),
        ];
        let order = order_lines(&lines, TextDirection::HorizontalLr, &Rect::from_size(1000, 1000));
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_vertical_right_to_left_columns() {
        let lines = vec![
            line(0, None, 100.0, 100.0, 140.0, 900.0),
            line(1, None, 800.0, 100.0, 840.0, 900.0),
            line(2, None, 500.0, 100.0, 540.0, 900.0),
        ];
        let order = order_lines(&lines, TextDirection::VerticalRl, &Rect::from_size(1000, 1000));
        assert_eq!(order, vec![1, 2, 0]);
        let order = order_lines(&lines, TextDirection::VerticalLr, &Rect::from_size(1000, 1000));
        assert_eq!(order, vec![0, 2, 1]);
    }

    #[test]
    fn test_regions_first_then_lines_and_nesting() {
        let regions = vec![
            region(0, 550.0, 50.0, 950.0, 950.0),
            region(1, 50.0, 50.0, 500.0, 950.0),
            region(2, 600.0, 600.0, 900.0, 700.0),
        ];
        let lines = vec![
            line(0, Some(0), 560.0, 100.0, 940.0, 140.0),
            line(1, Some(1), 60.0, 300.0, 490.0, 340.0),
            line(2, Some(1), 60.0, 100.0, 490.0, 140.0),
            line(3, Some(2), 610.0, 620.0, 890.0, 660.0),
        ];
        let graph = read_order(
            &page(lines, regions, TextDirection::HorizontalLr),
            None,
            &ReadingOrderConfig::default(),
        );
        assert_eq!(graph.region_order(), vec![1, 0, 2]);
        assert_eq!(graph.line_order(), vec![2, 1, 0, 3]);
        assert!(graph.is_valid_linearization());
    }

    #[derive(Debug)]
    struct PreferLower;

    impl PairwiseOrderModel for PreferLower {
        fn info(&self) -> ModelInfo {
            ModelInfo::new("prefer-lower", ModelKind::ReadingOrder)
        }

        fn precedes(&self, features: &OrderFeatures) -> Result<f32, OCRError> {
            // First unit read first when it is lower on the page.
            Ok(if features.values[1] > features.values[5] { 0.9 } else { 0.1 })
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl PairwiseOrderModel for Broken {
        fn info(&self) -> ModelInfo {
            ModelInfo::new("broken", ModelKind::ReadingOrder)
        }

        fn precedes(&self, _: &OrderFeatures) -> Result<f32, OCRError> {
            Err(OCRError::invalid_input("no session"))
        }
    }

    fn stacked() -> SegmentationResult {
        page(
            vec![
                line(0, None, 100.0, 100.0, 900.0, 140.0),
                line(1, None, 100.0, 200.0, 900.0, 240.0),
                line(2, None, 100.0, 300.0, 900.0, 340.0),
            ],
            vec![],
            TextDirection::HorizontalLr,
        )
    }

    #[test]
    fn test_geometry_first_ignores_conflicting_model() {
        let graph = read_order(&stacked(), Some(&PreferLower), &ReadingOrderConfig::default());
        assert_eq!(graph.line_order(), vec![0, 1, 2]);
    }

    #[test]
    fn test_learned_override_reverses_order() {
        let config = ReadingOrderConfig::default().with_policy(OrderPolicy::LearnedOverride);
        let graph = read_order(&stacked(), Some(&PreferLower), &config);
        assert_eq!(graph.line_order(), vec![2, 1, 0]);
        assert!(graph.is_valid_linearization());
    }

    #[test]
    fn test_geometry_only_and_failing_model() {
        let config = ReadingOrderConfig::default().with_policy(OrderPolicy::GeometryOnly);
        let graph = read_order(&stacked(), Some(&PreferLower), &config);
        assert_eq!(graph.line_order(), vec![0, 1, 2]);

        let config = ReadingOrderConfig::default().with_policy(OrderPolicy::LearnedOverride);
        let graph = read_order(&stacked(), Some(&Broken), &config);
        assert_eq!(graph.line_order(), vec![0, 1, 2]);
    }

    #[test]
    fn test_closure_rejects_cycles() {
        let mut closure = Closure::new(3);
        assert_eq!(closure.insert(0, 1), Ok(true));
        assert_eq!(closure.insert(1, 2), Ok(true));
        assert_eq!(closure.insert(0, 2), Ok(false));
        assert_eq!(closure.insert(2, 0), Err(OrderingError::Cycle { from: 2, to: 0 }));
    }

    #[test]
    fn test_empty_page() {
        let graph = read_order(
            &page(vec![], vec![], TextDirection::HorizontalLr),
            None,
            &ReadingOrderConfig::default(),
        );
        assert!(graph.order.is_empty());
        assert!(graph.is_valid_linearization());
    }

    #[test]
    fn test_config_validation() {
        assert!(ReadingOrderConfig::default().validate().is_ok());
        assert!(ReadingOrderConfig::default().with_min_confidence(0.2).validate().is_err());
        let parsed: ReadingOrderConfig =
            serde_json::from_str(r#"{"policy": "learned_override"}"#).unwrap();
        assert_eq!(parsed.policy, OrderPolicy::LearnedOverride);
    }
}
