use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

/// Side length of the logical output canvas. All rendered geometry lives
/// in a fixed `CANVAS_SIZE x CANVAS_SIZE` coordinate frame regardless of
/// the source image resolution.
pub const CANVAS_SIZE: f64 = 500.0;

// Tolerance for point equality. Detected coordinates come from pixel
// centroids and snapped anchors, so exact float comparison is never safe.
const EPSILON: f64 = 1e-6;

/// Componentwise tolerance for treating two curves as duplicates.
pub const CURVE_DEDUP_TOLERANCE: f64 = 5.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }

    /// Rotate this point about `center` by `angle_rad` (counterclockwise
    /// in the y-down image frame).
    pub fn rotated_about(&self, center: Point, angle_rad: f64) -> Point {
        let rotation = Rotation2::new(angle_rad);
        let offset = Vector2::new(self.x - center.x, self.y - center.y);
        let rotated = rotation * offset;
        Point {
            x: rotated.x + center.x,
            y: rotated.y + center.y,
        }
    }

    pub fn scaled(&self, sx: f64, sy: f64) -> Point {
        Point {
            x: self.x * sx,
            y: self.y * sy,
        }
    }

    /// Componentwise closeness used by the curve duplicate rule.
    pub fn within(&self, other: &Point, tolerance: f64) -> bool {
        (self.x - other.x).abs() < tolerance && (self.y - other.y).abs() < tolerance
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        // Epsilon comparison: coordinates are floats derived from pixels
        (self.x - other.x).abs() < EPSILON && (self.y - other.y).abs() < EPSILON
    }
}

/// A straight stroke between two anchors. Undirected: `(p1, p2)` and
/// `(p2, p1)` describe the same path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinePath {
    pub p1: Point,
    pub p2: Point,
}

impl LinePath {
    pub fn new(p1: Point, p2: Point) -> Self {
        LinePath { p1, p2 }
    }

    /// Endpoint equality ignoring direction.
    pub fn same_endpoints(&self, other: &LinePath) -> bool {
        (self.p1 == other.p1 && self.p2 == other.p2)
            || (self.p1 == other.p2 && self.p2 == other.p1)
    }

    /// A path from an anchor back to itself carries no information.
    pub fn is_self_loop(&self) -> bool {
        self.p1 == self.p2
    }

    pub fn rotated_about(&self, center: Point, angle_rad: f64) -> LinePath {
        LinePath {
            p1: self.p1.rotated_about(center, angle_rad),
            p2: self.p2.rotated_about(center, angle_rad),
        }
    }

    pub fn scaled(&self, sx: f64, sy: f64) -> LinePath {
        LinePath {
            p1: self.p1.scaled(sx, sy),
            p2: self.p2.scaled(sx, sy),
        }
    }
}

/// A quadratic Bezier stroke. Endpoints normally coincide with anchors;
/// the control point is free.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePath {
    pub p1: Point,
    pub ctrl: Point,
    pub p2: Point,
}

impl CurvePath {
    pub fn new(p1: Point, ctrl: Point, p2: Point) -> Self {
        CurvePath { p1, ctrl, p2 }
    }

    /// Two curves are duplicates when all three defining points sit
    /// within `tolerance` of each other componentwise.
    pub fn near_duplicate(&self, other: &CurvePath, tolerance: f64) -> bool {
        self.p1.within(&other.p1, tolerance)
            && self.ctrl.within(&other.ctrl, tolerance)
            && self.p2.within(&other.p2, tolerance)
    }

    pub fn rotated_about(&self, center: Point, angle_rad: f64) -> CurvePath {
        CurvePath {
            p1: self.p1.rotated_about(center, angle_rad),
            ctrl: self.ctrl.rotated_about(center, angle_rad),
            p2: self.p2.rotated_about(center, angle_rad),
        }
    }

    pub fn scaled(&self, sx: f64, sy: f64) -> CurvePath {
        CurvePath {
            p1: self.p1.scaled(sx, sy),
            ctrl: self.ctrl.scaled(sx, sy),
            p2: self.p2.scaled(sx, sy),
        }
    }
}

/// The closed set of path kinds. Dedup, rotation and rendering all match
/// exhaustively on this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PathElement {
    #[serde(rename = "line")]
    Line(LinePath),
    #[serde(rename = "curve")]
    Curve(CurvePath),
}

impl PathElement {
    pub fn rotated_about(&self, center: Point, angle_rad: f64) -> PathElement {
        match self {
            PathElement::Line(line) => PathElement::Line(line.rotated_about(center, angle_rad)),
            PathElement::Curve(curve) => PathElement::Curve(curve.rotated_about(center, angle_rad)),
        }
    }
}

/// Aggregate result of one detection or recreation pass: anchors plus the
/// deduplicated paths between them. Built fresh per request, never shared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pattern {
    pub anchors: Vec<Point>,
    pub lines: Vec<LinePath>,
    pub curves: Vec<CurvePath>,
}

impl Pattern {
    pub fn dots_only(anchors: Vec<Point>) -> Self {
        Pattern {
            anchors,
            lines: Vec::new(),
            curves: Vec::new(),
        }
    }

    pub fn path_count(&self) -> usize {
        self.lines.len() + self.curves.len()
    }

    pub fn has_paths(&self) -> bool {
        self.path_count() > 0
    }

    /// Combined path list in rendering order (lines first, then curves).
    pub fn paths(&self) -> Vec<PathElement> {
        self.lines
            .iter()
            .copied()
            .map(PathElement::Line)
            .chain(self.curves.iter().copied().map(PathElement::Curve))
            .collect()
    }

    /// Re-express every coordinate through the given per-axis scale.
    pub fn scaled(&self, sx: f64, sy: f64) -> Pattern {
        Pattern {
            anchors: self.anchors.iter().map(|p| p.scaled(sx, sy)).collect(),
            lines: self.lines.iter().map(|l| l.scaled(sx, sy)).collect(),
            curves: self.curves.iter().map(|c| c.scaled(sx, sy)).collect(),
        }
    }
}

/// Drop duplicate lines under the undirected-endpoint rule and any
/// self-loops. First-seen wins.
pub fn dedup_lines(lines: Vec<LinePath>) -> Vec<LinePath> {
    let mut unique: Vec<LinePath> = Vec::new();
    for line in lines {
        if line.is_self_loop() {
            continue;
        }
        if !unique.iter().any(|kept| kept.same_endpoints(&line)) {
            unique.push(line);
        }
    }
    unique
}

/// Drop curves whose three defining points all sit within `tolerance` of
/// an already-kept curve. First-seen wins; no merging.
pub fn dedup_curves(curves: Vec<CurvePath>, tolerance: f64) -> Vec<CurvePath> {
    let mut unique: Vec<CurvePath> = Vec::new();
    for curve in curves {
        if !unique.iter().any(|kept| kept.near_duplicate(&curve, tolerance)) {
            unique.push(curve);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_distance_and_midpoint() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-9);
        let mid = a.midpoint(&b);
        assert_eq!(mid, Point::new(1.5, 2.0));
    }

    #[test]
    fn test_point_equality_uses_tolerance() {
        let a = Point::new(10.0, 20.0);
        let b = Point::new(10.0 + 1e-9, 20.0 - 1e-9);
        assert_eq!(a, b, "points within epsilon should compare equal");
        let c = Point::new(10.1, 20.0);
        assert_ne!(a, c);
    }

    #[test]
    fn test_rotation_quarter_turn() {
        let center = Point::new(250.0, 250.0);
        let p = Point::new(350.0, 250.0);
        let rotated = p.rotated_about(center, FRAC_PI_2);
        assert_eq!(rotated, Point::new(250.0, 350.0));
    }

    #[test]
    fn test_full_turn_returns_to_start() {
        let center = Point::new(250.0, 250.0);
        let p = Point::new(123.0, 77.0);
        let mut q = p;
        for _ in 0..4 {
            q = q.rotated_about(center, FRAC_PI_2);
        }
        assert_eq!(q, p, "four quarter turns should be the identity");
    }

    #[test]
    fn test_line_undirected_equality() {
        let a = Point::new(100.0, 100.0);
        let b = Point::new(100.0, 200.0);
        let forward = LinePath::new(a, b);
        let backward = LinePath::new(b, a);
        assert!(forward.same_endpoints(&backward));
    }

    #[test]
    fn test_dedup_lines_keeps_one_direction() {
        let a = Point::new(100.0, 100.0);
        let b = Point::new(100.0, 200.0);
        let deduped = dedup_lines(vec![LinePath::new(a, b), LinePath::new(b, a)]);
        assert_eq!(deduped.len(), 1, "reversed duplicate should be dropped");
        assert!(deduped[0].same_endpoints(&LinePath::new(a, b)));
    }

    #[test]
    fn test_dedup_lines_drops_self_loops() {
        let a = Point::new(50.0, 50.0);
        let b = Point::new(60.0, 50.0);
        let deduped = dedup_lines(vec![LinePath::new(a, a), LinePath::new(a, b)]);
        assert_eq!(deduped.len(), 1);
        assert!(!deduped[0].is_self_loop());
    }

    #[test]
    fn test_dedup_curves_within_tolerance() {
        let base = CurvePath::new(
            Point::new(10.0, 10.0),
            Point::new(50.0, 0.0),
            Point::new(90.0, 10.0),
        );
        let nearby = CurvePath::new(
            Point::new(13.0, 12.0),
            Point::new(52.0, 3.0),
            Point::new(88.0, 8.0),
        );
        let distinct = CurvePath::new(
            Point::new(10.0, 10.0),
            Point::new(50.0, 40.0),
            Point::new(90.0, 10.0),
        );
        let deduped = dedup_curves(vec![base, nearby, distinct], CURVE_DEDUP_TOLERANCE);
        assert_eq!(deduped.len(), 2, "near-duplicate should be dropped, distinct kept");
        assert_eq!(deduped[0], base, "first-seen curve wins");
    }

    #[test]
    fn test_pattern_paths_combines_kinds() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        let pattern = Pattern {
            anchors: vec![a, b],
            lines: vec![LinePath::new(a, b)],
            curves: vec![CurvePath::new(a, Point::new(5.0, 5.0), b)],
        };
        assert_eq!(pattern.path_count(), 2);
        let paths = pattern.paths();
        assert!(matches!(paths[0], PathElement::Line(_)));
        assert!(matches!(paths[1], PathElement::Curve(_)));
    }
}
