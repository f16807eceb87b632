//! Planar primitives used by normalization and feature extraction.
//!
//! All distances are Euclidean in the normalized path frame. The
//! intersection test is the classic orientation-predicate formulation with a
//! collinearity tolerance of [`COLLINEAR_EPSILON`].

use serde::{Deserialize, Serialize};

/// Cross products with an absolute value at or below this are treated as
/// collinear by [`orientation`].
pub const COLLINEAR_EPSILON: f64 = 1e-12;

/// A point in the plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        point_to_point(self, other)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// An ordered pair of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn intersects(&self, other: &Segment) -> bool {
        segments_intersect(&self.start, &self.end, &other.start, &other.end)
    }
}

/// Winding of an ordered triple of points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Collinear,
    Clockwise,
    CounterClockwise,
}

/// Euclidean distance between two points.
pub fn point_to_point(a: &Point, b: &Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Perpendicular distance from `c` to the infinite line through `a` and `b`.
///
/// A degenerate line (`a == b`) yields 0.
pub fn point_to_line(a: &Point, b: &Point, c: &Point) -> f64 {
    let denominator = (b.y - a.y).hypot(b.x - a.x);
    if denominator == 0.0 {
        return 0.0;
    }

    let numerator = ((b.y - a.y) * c.x - (b.x - a.x) * c.y + b.x * a.y - b.y * a.x).abs();
    numerator / denominator
}

/// Rotates `point` about `origin` by `degrees`, clockwise in a y-down frame.
pub fn rotate_point(point: &Point, origin: &Point, degrees: f64) -> Point {
    let radians = degrees.to_radians();
    let (sin, cos) = radians.sin_cos();
    let dx = point.x - origin.x;
    let dy = point.y - origin.y;

    Point {
        x: origin.x + cos * dx + sin * dy,
        y: origin.y - sin * dx + cos * dy,
    }
}

/// Orientation of the ordered triple `(p, q, r)`.
pub fn orientation(p: &Point, q: &Point, r: &Point) -> Orientation {
    let val = (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y);

    if val.abs() <= COLLINEAR_EPSILON {
        Orientation::Collinear
    } else if val > 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

/// For collinear `p`, `q`, `r`: whether `q` lies within the bounding box of `pr`.
pub fn on_segment(p: &Point, q: &Point, r: &Point) -> bool {
    q.x <= p.x.max(r.x) && q.x >= p.x.min(r.x) && q.y <= p.y.max(r.y) && q.y >= p.y.min(r.y)
}

/// Whether segment `p1q1` intersects segment `p2q2`, touching endpoints included.
pub fn segments_intersect(p1: &Point, q1: &Point, p2: &Point, q2: &Point) -> bool {
    let o1 = orientation(p1, q1, p2);
    let o2 = orientation(p1, q1, q2);
    let o3 = orientation(p2, q2, p1);
    let o4 = orientation(p2, q2, q1);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == Orientation::Collinear && on_segment(p1, p2, q1))
        || (o2 == Orientation::Collinear && on_segment(p1, q2, q1))
        || (o3 == Orientation::Collinear && on_segment(p2, p1, q2))
        || (o4 == Orientation::Collinear && on_segment(p2, q1, q2))
}
