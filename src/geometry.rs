//! Polygon geometry primitives.
//!
//! Pure functions over vertex lists. Polygons are open rings (no repeated
//! last vertex), counter-clockwise for solids and clockwise for holes.
//! Orientation tests go through a floating-point filter with an exact
//! fallback from the `robust` crate, so near-degenerate inputs do not flip
//! signs.

use robust::{orient2d as orient2d_exact, Coord};
use serde::{Deserialize, Serialize};

/// Tolerance for coordinate equality comparisons.
pub const EPS: f64 = 1e-9;

/// A 2D point in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    /// True if both coordinates match within `tol`.
    pub fn almost_equal(&self, other: Point, tol: f64) -> bool {
        (self.x - other.x).abs() < tol && (self.y - other.y).abs() < tol
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// Smallest box covering both boxes.
    pub fn merged(&self, other: &Bounds) -> Bounds {
        let min_x = self.x.min(other.x);
        let min_y = self.y.min(other.y);
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());
        Bounds {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Bounds {
        Bounds {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    fn disjoint(&self, other: &Bounds) -> bool {
        self.max_x() < other.x - EPS
            || other.max_x() < self.x - EPS
            || self.max_y() < other.y - EPS
            || other.max_y() < self.y - EPS
    }
}

/// Result of an orientation test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    CounterClockwise,
    Clockwise,
    Collinear,
}

impl Orientation {
    #[inline]
    pub fn is_ccw(self) -> bool {
        matches!(self, Orientation::CounterClockwise)
    }

    #[inline]
    pub fn is_cw(self) -> bool {
        matches!(self, Orientation::Clockwise)
    }

    #[inline]
    pub fn is_collinear(self) -> bool {
        matches!(self, Orientation::Collinear)
    }
}

/// Relative magnitude below which the fast determinant is not trusted.
const FILTER_EPSILON: f64 = 1e-12;

/// Orientation of `c` relative to the directed line `a -> b`.
///
/// Fast cross-product path with an exact Shewchuk fallback when the
/// determinant is too small to trust.
#[inline]
pub fn orient2d(a: Point, b: Point, c: Point) -> Orientation {
    let acx = a.x - c.x;
    let bcx = b.x - c.x;
    let acy = a.y - c.y;
    let bcy = b.y - c.y;

    let det = acx * bcy - acy * bcx;
    let det_sum = (acx * bcy).abs() + (acy * bcx).abs();

    if det.abs() > FILTER_EPSILON * det_sum {
        return if det > 0.0 {
            Orientation::CounterClockwise
        } else {
            Orientation::Clockwise
        };
    }

    let exact = orient2d_exact(
        Coord { x: a.x, y: a.y },
        Coord { x: b.x, y: b.y },
        Coord { x: c.x, y: c.y },
    );
    if exact > 0.0 {
        Orientation::CounterClockwise
    } else if exact < 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::Collinear
    }
}

/// Signed area via the shoelace formula. Positive for counter-clockwise.
pub fn signed_area(polygon: &[Point]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += polygon[i].x * polygon[j].y;
        area -= polygon[j].x * polygon[i].y;
    }
    area / 2.0
}

/// Absolute polygon area.
pub fn area(polygon: &[Point]) -> f64 {
    signed_area(polygon).abs()
}

/// Area-weighted centroid. Falls back to the vertex mean when the polygon is
/// degenerate (zero area).
pub fn centroid(polygon: &[Point]) -> Point {
    let n = polygon.len();
    if n == 0 {
        return Point::default();
    }
    let a = signed_area(polygon);
    if a.abs() < EPS {
        let (sx, sy) = polygon
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        return Point::new(sx / n as f64, sy / n as f64);
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        let cross = polygon[i].x * polygon[j].y - polygon[j].x * polygon[i].y;
        cx += (polygon[i].x + polygon[j].x) * cross;
        cy += (polygon[i].y + polygon[j].y) * cross;
    }
    Point::new(cx / (6.0 * a), cy / (6.0 * a))
}

/// Axis-aligned bounds of a polygon.
pub fn bounds(polygon: &[Point]) -> Bounds {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for p in polygon {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Bounds {
        x: min_x,
        y: min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    }
}

/// Rotates a polygon around the origin by `degrees`.
pub fn rotate_polygon(polygon: &[Point], degrees: f64) -> Vec<Point> {
    if degrees.abs() < EPS {
        return polygon.to_vec();
    }
    let rad = degrees.to_radians();
    let (sin_a, cos_a) = rad.sin_cos();
    polygon
        .iter()
        .map(|p| Point::new(p.x * cos_a - p.y * sin_a, p.x * sin_a + p.y * cos_a))
        .collect()
}

/// Translates a polygon by `(dx, dy)`.
pub fn translate_polygon(polygon: &[Point], dx: f64, dy: f64) -> Vec<Point> {
    polygon.iter().map(|p| p.translated(dx, dy)).collect()
}

/// Returns the polygon in counter-clockwise winding.
pub fn ensure_ccw(polygon: &[Point]) -> Vec<Point> {
    if signed_area(polygon) < 0.0 {
        polygon.iter().rev().copied().collect()
    } else {
        polygon.to_vec()
    }
}

/// Moves the polygon so its bounding-box min corner sits at the origin and
/// makes the winding counter-clockwise.
pub fn normalize_polygon(polygon: &[Point]) -> Vec<Point> {
    let b = bounds(polygon);
    ensure_ccw(&translate_polygon(polygon, -b.x, -b.y))
}

/// Drops consecutive vertices closer than `tol` and a last vertex that
/// duplicates the first.
pub fn dedupe_polygon(polygon: &[Point], tol: f64) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(polygon.len());
    for &p in polygon {
        if out.last().map_or(true, |last| !last.almost_equal(p, tol)) {
            out.push(p);
        }
    }
    while out.len() > 1 {
        let first = out[0];
        let last = out[out.len() - 1];
        if first.almost_equal(last, tol) {
            out.pop();
        } else {
            break;
        }
    }
    out
}

/// Distance from a point to the segment `a -> b`.
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq < EPS * EPS {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * dx, a.y + t * dy))
}

/// True if `p` lies on the boundary of `polygon` within `tol`.
pub fn point_on_boundary(p: Point, polygon: &[Point], tol: f64) -> bool {
    let n = polygon.len();
    for i in 0..n {
        if point_segment_distance(p, polygon[i], polygon[(i + 1) % n]) < tol {
            return true;
        }
    }
    false
}

/// Ray-cast point-in-polygon test. Points on the boundary count as inside.
pub fn point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    if point_on_boundary(p, polygon, EPS) {
        return true;
    }
    let mut inside = false;
    let n = polygon.len();
    let mut j = n - 1;
    for i in 0..n {
        let pi = polygon[i];
        let pj = polygon[j];
        if ((pi.y > p.y) != (pj.y > p.y))
            && (p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// True if `p` is inside `polygon` but not on its boundary.
pub fn strictly_inside(p: Point, polygon: &[Point]) -> bool {
    point_in_polygon(p, polygon) && !point_on_boundary(p, polygon, EPS)
}

/// True if the open segments `p1 -> p2` and `q1 -> q2` cross at a single
/// interior point. Collinear overlap and shared endpoints do not count.
pub fn segments_properly_cross(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let o1 = orient2d(p1, p2, q1);
    let o2 = orient2d(p1, p2, q2);
    let o3 = orient2d(q1, q2, p1);
    let o4 = orient2d(q1, q2, p2);
    o1 != o2
        && o3 != o4
        && !o1.is_collinear()
        && !o2.is_collinear()
        && !o3.is_collinear()
        && !o4.is_collinear()
}

/// Intersection point of segments `p1 -> p2` and `q1 -> q2`, endpoints
/// included. `None` when the segments are parallel or do not meet.
pub fn segment_intersection(p1: Point, p2: Point, q1: Point, q2: Point) -> Option<Point> {
    let r = (p2.x - p1.x, p2.y - p1.y);
    let s = (q2.x - q1.x, q2.y - q1.y);
    let denom = r.0 * s.1 - r.1 * s.0;
    if denom.abs() < EPS {
        return None;
    }
    let qp = (q1.x - p1.x, q1.y - p1.y);
    let t = (qp.0 * s.1 - qp.1 * s.0) / denom;
    let u = (qp.0 * r.1 - qp.1 * r.0) / denom;
    if (-EPS..=1.0 + EPS).contains(&t) && (-EPS..=1.0 + EPS).contains(&u) {
        Some(Point::new(p1.x + t * r.0, p1.y + t * r.1))
    } else {
        None
    }
}

/// Interior-overlap test for two simple polygons. Touching along edges or at
/// vertices is not an overlap.
///
/// Checks every edge pair for a proper crossing, then falls back to a strict
/// vertex-containment test to catch full enclosure.
pub fn polygons_overlap(a: &[Point], b: &[Point]) -> bool {
    if a.len() < 3 || b.len() < 3 {
        return false;
    }
    if bounds(a).disjoint(&bounds(b)) {
        return false;
    }

    let na = a.len();
    let nb = b.len();
    for i in 0..na {
        let a1 = a[i];
        let a2 = a[(i + 1) % na];
        for j in 0..nb {
            if segments_properly_cross(a1, a2, b[j], b[(j + 1) % nb]) {
                return true;
            }
        }
    }

    a.iter().any(|&p| strictly_inside(p, b)) || b.iter().any(|&p| strictly_inside(p, a))
}

/// True if every vertex of `inner` lies inside `outer` (boundary counts) and
/// no edge of `inner` properly crosses an edge of `outer`.
pub fn polygon_inside(inner: &[Point], outer: &[Point]) -> bool {
    if inner.iter().any(|&p| !point_in_polygon(p, outer)) {
        return false;
    }
    let ni = inner.len();
    let no = outer.len();
    for i in 0..ni {
        let i1 = inner[i];
        let i2 = inner[(i + 1) % ni];
        for j in 0..no {
            if segments_properly_cross(i1, i2, outer[j], outer[(j + 1) % no]) {
                return false;
            }
        }
    }
    true
}

/// True if any pair of non-adjacent edges intersects, i.e. the outline is not
/// simple.
pub fn is_self_intersecting(polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n < 4 {
        return false;
    }
    for i in 0..n {
        for j in (i + 1)..n {
            // Skip adjacent edges (shared endpoint).
            if j == i || (j + 1) % n == i || (i + 1) % n == j {
                continue;
            }
            if segments_properly_cross(
                polygon[i],
                polygon[(i + 1) % n],
                polygon[j],
                polygon[(j + 1) % n],
            ) {
                return true;
            }
        }
    }
    false
}

/// True if the polygon is a four-vertex axis-aligned rectangle.
pub fn is_rectangle(polygon: &[Point], tol: f64) -> bool {
    if polygon.len() != 4 {
        return false;
    }
    let b = bounds(polygon);
    polygon.iter().all(|p| {
        let on_x = (p.x - b.x).abs() < tol || (p.x - b.max_x()).abs() < tol;
        let on_y = (p.y - b.y).abs() < tol || (p.y - b.max_y()).abs() < tol;
        on_x && on_y
    })
}

/// Convexity test ignoring collinear runs.
pub fn is_convex(polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut expected: Option<Orientation> = None;
    for i in 0..n {
        let o = orient2d(polygon[i], polygon[(i + 1) % n], polygon[(i + 2) % n]);
        if o.is_collinear() {
            continue;
        }
        match expected {
            None => expected = Some(o),
            Some(e) if e != o => return false,
            _ => {}
        }
    }
    true
}

/// Convex hull (Andrew monotone chain), counter-clockwise.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points.to_vec();
    pts.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    pts.dedup_by(|a, b| a.almost_equal(*b, EPS));
    let n = pts.len();
    if n < 3 {
        return pts;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(n);
    for &p in &pts {
        while lower.len() >= 2
            && !orient2d(lower[lower.len() - 2], lower[lower.len() - 1], p).is_ccw()
        {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point> = Vec::with_capacity(n);
    for &p in pts.iter().rev() {
        while upper.len() >= 2
            && !orient2d(upper[upper.len() - 2], upper[upper.len() - 1], p).is_ccw()
        {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}
