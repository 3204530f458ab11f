//! Geometric primitives for page layout.
//!
//! Baselines are open [`Polyline`]s, regions and line boundaries are closed
//! [`Polygon`]s. Both use page pixel coordinates with the origin at the top
//! left corner and y growing downwards.

use imageproc::point::Point as ImageProcPoint;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const EPS: f32 = 1e-6;

/// Why a polygon cannot be used as produced.
///
/// These never reach callers: polygons are repaired or dropped where they are built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Fewer than three distinct vertices or zero area.
    #[error("degenerate polygon with {points} distinct point(s) and area {area}")]
    Degenerate { points: usize, area: f32 },
    /// Two non-adjacent edges cross.
    #[error("self-intersecting polygon: edges {first} and {second} cross")]
    SelfIntersecting { first: usize, second: usize },
}

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Converts this point to an imageproc point, rounding to the nearest pixel.
    pub fn to_imageproc_point(&self) -> ImageProcPoint<i32> {
        ImageProcPoint::new(self.x.round() as i32, self.y.round() as i32)
    }
}

/// Cross product of `(b - a) x (c - a)`. Positive for a counter-clockwise turn
/// in a y-up frame.
#[inline]
pub(crate) fn cross(a: &Point, b: &Point, c: &Point) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Perpendicular distance from `point` to the segment `start..end`.
fn point_to_segment_distance(point: &Point, start: &Point, end: &Point) -> f32 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq <= EPS {
        return point.distance(start);
    }
    let t = (((point.x - start.x) * dx + (point.y - start.y) * dy) / len_sq).clamp(0.0, 1.0);
    point.distance(&Point::new(start.x + t * dx, start.y + t * dy))
}

fn on_segment(p: &Point, q: &Point, r: &Point) -> bool {
    q.x <= p.x.max(r.x) + EPS
        && q.x + EPS >= p.x.min(r.x)
        && q.y <= p.y.max(r.y) + EPS
        && q.y + EPS >= p.y.min(r.y)
}

/// Returns true if segments `p1..p2` and `q1..q2` intersect (touching counts).
pub(crate) fn segments_intersect(p1: &Point, p2: &Point, q1: &Point, q2: &Point) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);

    if ((d1 > EPS && d2 < -EPS) || (d1 < -EPS && d2 > EPS))
        && ((d3 > EPS && d4 < -EPS) || (d3 < -EPS && d4 > EPS))
    {
        return true;
    }
    (d1.abs() <= EPS && on_segment(q1, p1, q2))
        || (d2.abs() <= EPS && on_segment(q1, p2, q2))
        || (d3.abs() <= EPS && on_segment(p1, q1, p2))
        || (d4.abs() <= EPS && on_segment(p1, q2, p2))
}

/// Iterative Douglas-Peucker over an open point sequence. Endpoints are always kept.
fn douglas_peucker(points: &[Point], epsilon: f32) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut stack = vec![(0usize, last)];
    while let Some((start, end)) = stack.pop() {
        if end - start <= 1 {
            continue;
        }
        let (max_index, max_dist) = ((start + 1)..end)
            .map(|i| {
                (
                    i,
                    point_to_segment_distance(&points[i], &points[start], &points[end]),
                )
            })
            .fold((start, 0.0f32), |best, cur| if cur.1 > best.1 { cur } else { best });

        if max_dist > epsilon {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl Rect {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min: x_min.min(x_max),
            y_min: y_min.min(y_max),
            x_max: x_min.max(x_max),
            y_max: y_min.max(y_max),
        }
    }

    /// Rectangle spanning a page of `width` x `height` pixels.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.x_min && p.x <= self.x_max && p.y >= self.y_min && p.y <= self.y_max
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x_min >= self.x_min
            && other.x_max <= self.x_max
            && other.y_min >= self.y_min
            && other.y_max <= self.y_max
    }

    /// Whether the horizontal extents overlap by more than `EPS`.
    pub fn x_overlaps(&self, other: &Rect) -> bool {
        self.x_min.max(other.x_min) < self.x_max.min(other.x_max) - EPS
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.x_min.min(other.x_min),
            self.y_min.min(other.y_min),
            self.x_max.max(other.x_max),
            self.y_max.max(other.y_max),
        )
    }

    /// Corner points, clockwise in image coordinates starting at the top left.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x_min, self.y_min),
            Point::new(self.x_max, self.y_min),
            Point::new(self.x_max, self.y_max),
            Point::new(self.x_min, self.y_max),
        ]
    }

    /// Clamps a point into the rectangle.
    pub fn clamp_point(&self, p: Point) -> Point {
        Point::new(
            p.x.clamp(self.x_min, self.x_max),
            p.y.clamp(self.y_min, self.y_max),
        )
    }
}

/// An open polyline, e.g. a baseline. Points follow the writing direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub points: Vec<Point>,
}

impl Polyline {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Total arc length.
    pub fn length(&self) -> f32 {
        self.points
            .iter()
            .tuple_windows()
            .map(|(a, b)| a.distance(b))
            .sum()
    }

    pub fn start(&self) -> Option<&Point> {
        self.points.first()
    }

    pub fn end(&self) -> Option<&Point> {
        self.points.last()
    }

    /// Bounding rectangle, or `None` for an empty polyline.
    pub fn bounding_rect(&self) -> Option<Rect> {
        bounding_rect_of(&self.points)
    }

    pub fn reversed(&self) -> Polyline {
        Polyline::new(self.points.iter().rev().copied().collect())
    }

    /// Douglas-Peucker simplification keeping both endpoints.
    pub fn simplify(&self, epsilon: f32) -> Polyline {
        Polyline::new(douglas_peucker(&self.points, epsilon))
    }

    /// Simplifies with `epsilon`, doubling it until at most `max_points` remain.
    ///
    /// `max_points` below 2 is treated as 2.
    pub fn simplify_bounded(&self, epsilon: f32, max_points: usize) -> Polyline {
        let max_points = max_points.max(2);
        let mut eps = epsilon.max(EPS);
        let mut simplified = self.simplify(eps);
        while simplified.len() > max_points {
            eps *= 2.0;
            simplified = self.simplify(eps);
        }
        simplified
    }

    /// Points spaced at most `step` apart along the polyline, including vertices.
    pub fn densify(&self, step: f32) -> Vec<Point> {
        let step = step.max(0.5);
        let mut out = Vec::new();
        for (a, b) in self.points.iter().tuple_windows() {
            let n = (a.distance(b) / step).ceil().max(1.0) as usize;
            for i in 0..n {
                let t = i as f32 / n as f32;
                out.push(Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y)));
            }
        }
        if let Some(last) = self.points.last() {
            out.push(*last);
        }
        out
    }

    /// Removes consecutive duplicate points.
    pub fn dedup(&self) -> Polyline {
        let mut points = self.points.clone();
        points.dedup_by(|a, b| a.distance(b) <= EPS);
        Polyline::new(points)
    }
}

/// A closed polygon. The closing edge from the last to the first point is implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn from_rect(rect: &Rect) -> Self {
        Self::new(rect.corners().to_vec())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Signed shoelace area; positive when the points run clockwise on screen.
    pub fn signed_area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let sum: f32 = self
            .points
            .iter()
            .circular_tuple_windows()
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum();
        sum / 2.0
    }

    pub fn area(&self) -> f32 {
        self.signed_area().abs()
    }

    pub fn perimeter(&self) -> f32 {
        self.points
            .iter()
            .circular_tuple_windows()
            .map(|(a, b)| a.distance(b))
            .sum()
    }

    /// Bounding rectangle, or `None` for an empty polygon.
    pub fn bounding_rect(&self) -> Option<Rect> {
        bounding_rect_of(&self.points)
    }

    /// Even-odd point containment. Points on the boundary count as inside.
    pub fn contains_point(&self, p: &Point) -> bool {
        if self.points.len() < 3 {
            return false;
        }
        let mut inside = false;
        for (a, b) in self.points.iter().circular_tuple_windows() {
            if point_to_segment_distance(p, a, b) <= 1e-4 {
                return true;
            }
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Convex hull via Graham scan. Collinear boundary points are dropped.
    pub fn convex_hull(points: &[Point]) -> Polygon {
        let mut pts: Vec<Point> = points.to_vec();
        pts.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
        pts.dedup_by(|a, b| a.distance(b) <= EPS);
        if pts.len() < 3 {
            return Polygon::new(pts);
        }

        let start = pts[0];
        pts[1..].sort_by(|a, b| {
            let c = cross(&start, a, b);
            if c.abs() <= EPS {
                start.distance(a).total_cmp(&start.distance(b))
            } else if c > 0.0 {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            }
        });

        let mut hull: Vec<Point> = Vec::with_capacity(pts.len());
        for p in pts {
            while hull.len() > 1 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], &p) <= EPS
            {
                hull.pop();
            }
            hull.push(p);
        }
        Polygon::new(hull)
    }

    /// Douglas-Peucker simplification of the closed ring.
    pub fn simplify(&self, epsilon: f32) -> Polygon {
        if self.points.len() <= 3 {
            return self.clone();
        }
        // Split the ring at the vertex farthest from the first one so both
        // halves are simplified as open chains with fixed endpoints.
        let first = self.points[0];
        let (split, _) = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, first.distance(p)))
            .fold((0, 0.0f32), |best, cur| if cur.1 > best.1 { cur } else { best });
        if split == 0 {
            return self.clone();
        }
        let head = douglas_peucker(&self.points[..=split], epsilon);
        let mut tail_src: Vec<Point> = self.points[split..].to_vec();
        tail_src.push(first);
        let tail = douglas_peucker(&tail_src, epsilon);

        let mut points = head;
        points.extend_from_slice(&tail[1..tail.len() - 1]);
        Polygon::new(points)
    }

    /// Removes consecutive duplicates, including a repeated closing point.
    pub fn dedup(&self) -> Polygon {
        let mut points = self.points.clone();
        points.dedup_by(|a, b| a.distance(b) <= EPS);
        while points.len() > 1 && points[0].distance(&points[points.len() - 1]) <= EPS {
            points.pop();
        }
        Polygon::new(points)
    }

    /// Finds the first pair of crossing non-adjacent edges.
    pub fn self_intersection(&self) -> Option<(usize, usize)> {
        let n = self.points.len();
        if n < 4 {
            return None;
        }
        for i in 0..n {
            let (a1, a2) = (&self.points[i], &self.points[(i + 1) % n]);
            for j in (i + 2)..n {
                if i == 0 && j == n - 1 {
                    continue;
                }
                let (b1, b2) = (&self.points[j], &self.points[(j + 1) % n]);
                if segments_intersect(a1, a2, b1, b2) {
                    return Some((i, j));
                }
            }
        }
        None
    }

    /// Checks the non-degenerate, non-self-intersecting invariant.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let deduped = self.dedup();
        let area = deduped.area();
        if deduped.len() < 3 || area <= EPS {
            return Err(GeometryError::Degenerate {
                points: deduped.len(),
                area,
            });
        }
        if let Some((first, second)) = deduped.self_intersection() {
            return Err(GeometryError::SelfIntersecting { first, second });
        }
        Ok(())
    }

    /// Sutherland-Hodgman clipping against an axis-aligned rectangle.
    pub fn clip_to_rect(&self, rect: &Rect) -> Polygon {
        type Inside = fn(&Point, &Rect) -> bool;
        type Intersect = fn(&Point, &Point, &Rect) -> Point;

        fn lerp_x(a: &Point, b: &Point, x: f32) -> Point {
            let t = (x - a.x) / (b.x - a.x);
            Point::new(x, a.y + t * (b.y - a.y))
        }
        fn lerp_y(a: &Point, b: &Point, y: f32) -> Point {
            let t = (y - a.y) / (b.y - a.y);
            Point::new(a.x + t * (b.x - a.x), y)
        }

        let edges: [(Inside, Intersect); 4] = [
            (|p, r| p.x >= r.x_min, |a, b, r| lerp_x(a, b, r.x_min)),
            (|p, r| p.x <= r.x_max, |a, b, r| lerp_x(a, b, r.x_max)),
            (|p, r| p.y >= r.y_min, |a, b, r| lerp_y(a, b, r.y_min)),
            (|p, r| p.y <= r.y_max, |a, b, r| lerp_y(a, b, r.y_max)),
        ];

        let mut output = self.points.clone();
        for (inside, intersect) in edges {
            if output.is_empty() {
                break;
            }
            let input = std::mem::take(&mut output);
            for (prev, cur) in input.iter().circular_tuple_windows() {
                match (inside(prev, rect), inside(cur, rect)) {
                    (true, true) => output.push(*cur),
                    (true, false) => output.push(intersect(prev, cur, rect)),
                    (false, true) => {
                        output.push(intersect(prev, cur, rect));
                        output.push(*cur);
                    }
                    (false, false) => {}
                }
            }
        }
        Polygon::new(output).dedup()
    }

    /// Fraction of `points` that lie inside this polygon.
    pub fn coverage_of(&self, points: &[Point]) -> f32 {
        if points.is_empty() {
            return 0.0;
        }
        let inside = points.iter().filter(|p| self.contains_point(p)).count();
        inside as f32 / points.len() as f32
    }
}

fn bounding_rect_of(points: &[Point]) -> Option<Rect> {
    let (x_min, x_max) = points
        .iter()
        .map(|p| p.x)
        .minmax_by(|a, b| a.total_cmp(b))
        .into_option()?;
    let (y_min, y_max) = points
        .iter()
        .map(|p| p.y)
        .minmax_by(|a, b| a.total_cmp(b))
        .into_option()?;
    Some(Rect::new(x_min, y_min, x_max, y_max))
}
