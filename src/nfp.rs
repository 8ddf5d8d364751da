//! No-Fit Polygon computation.
//!
//! The outer NFP of polygons A and B is the set of translations of B (whose
//! reference point is its coordinate origin) where B touches or overlaps A.
//! The inner variant is the set of translations keeping B inside a container.
//!
//! Algorithm selection:
//! - **Convex pair**: direct Minkowski sum of A and reflected B, merging the
//!   angularly sorted edge lists in one sweep.
//! - **General pair**: triangulate both outlines, Minkowski-sum every
//!   triangle pair and union the partial results. Pockets of concave
//!   stationary polygons show up as holes of the union.
//! - **General pair with `explore_concave`**: orbital sliding (see
//!   [`crate::sliding`]) seeded from concave pockets.
//! - **Inner**: rectangle containers use the bounds fast path; general
//!   containers subtract the dilated boundary (edges ⊕ reflected part) from
//!   the anchored container region, which yields the feasible loops together
//!   with forbidden islands around container holes.

use crate::clipper;
use crate::geometry::{self, Point, EPS};
use crate::sliding;

/// One connected piece of an NFP: an outer loop plus hole loops.
///
/// For an inner NFP the holes are forbidden islands; for an outer NFP they
/// are reachable pockets.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub outer: Vec<Point>,
    pub holes: Vec<Vec<Point>>,
}

impl Region {
    pub fn from_loop(outer: Vec<Point>) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Region {
        Region {
            outer: geometry::translate_polygon(&self.outer, dx, dy),
            holes: self
                .holes
                .iter()
                .map(|h| geometry::translate_polygon(h, dx, dy))
                .collect(),
        }
    }

    /// All loops of the region, outer first.
    pub fn loops(&self) -> impl Iterator<Item = &Vec<Point>> {
        std::iter::once(&self.outer).chain(self.holes.iter())
    }

    /// Allowed-region membership: inside the outer loop (boundary included)
    /// and not strictly inside any island.
    pub fn contains(&self, p: Point) -> bool {
        geometry::point_in_polygon(p, &self.outer)
            && !self.holes.iter().any(|h| geometry::strictly_inside(p, h))
    }

    /// Blocked-region membership: strictly inside the outer loop and not in
    /// a pocket. Boundary points are touching placements and stay allowed.
    pub fn forbids(&self, p: Point) -> bool {
        geometry::strictly_inside(p, &self.outer)
            && !self.holes.iter().any(|h| geometry::point_in_polygon(p, h))
    }
}

/// A computed NFP: one or more disjoint regions.
#[derive(Debug, Clone, PartialEq)]
pub struct Nfp {
    pub regions: Vec<Region>,
}

impl Nfp {
    pub fn translated(&self, dx: f64, dy: f64) -> Nfp {
        Nfp {
            regions: self.regions.iter().map(|r| r.translated(dx, dy)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Outcome of an NFP query. Failures are first-class values so the cache can
/// remember them and callers treat the pair as non-placeable.
#[derive(Debug, Clone, PartialEq)]
pub enum NfpOutcome {
    Fit(Nfp),
    /// The query has no feasible answer: the part does not fit inside the
    /// container, or the sliding orbit failed to close.
    NoFit,
    /// The inputs were unusable (degenerate outlines).
    Degenerate,
}

impl NfpOutcome {
    pub fn nfp(&self) -> Option<&Nfp> {
        match self {
            NfpOutcome::Fit(nfp) => Some(nfp),
            _ => None,
        }
    }
}

// ============================================================================
// Outer NFP
// ============================================================================

/// Computes the outer NFP of stationary `a` and orbiting `b`, both already
/// rotated into place.
pub fn outer_nfp(a: &[Point], b: &[Point], explore_concave: bool) -> NfpOutcome {
    let a = geometry::dedupe_polygon(&geometry::ensure_ccw(a), EPS);
    let b = geometry::dedupe_polygon(&geometry::ensure_ccw(b), EPS);
    if a.len() < 3 || b.len() < 3 {
        return NfpOutcome::Degenerate;
    }

    if geometry::is_convex(&a) && geometry::is_convex(&b) {
        let loop_ = minkowski_sum_convex(&a, &reflect(&b));
        if loop_.len() < 3 {
            return NfpOutcome::Degenerate;
        }
        return NfpOutcome::Fit(Nfp {
            regions: vec![Region::from_loop(loop_)],
        });
    }

    if explore_concave {
        return match sliding::orbital_nfp(&a, &b) {
            Ok(loops) => match union_loops(loops) {
                Some(nfp) => NfpOutcome::Fit(nfp),
                None => NfpOutcome::NoFit,
            },
            Err(err) => {
                log::warn!("sliding NFP failed ({err}); pair treated as non-placeable");
                NfpOutcome::NoFit
            }
        };
    }

    minkowski_nfp_general(&a, &b)
}

/// Triangulated Minkowski NFP for non-convex pairs.
fn minkowski_nfp_general(a: &[Point], b: &[Point]) -> NfpOutcome {
    let tris_a = triangulate(a);
    let tris_b = triangulate(b);
    if tris_a.is_empty() || tris_b.is_empty() {
        return NfpOutcome::Degenerate;
    }

    let mut partials = Vec::with_capacity(tris_a.len() * tris_b.len());
    for ta in &tris_a {
        for tb in &tris_b {
            let sum = minkowski_sum_convex(ta, &reflect(tb));
            if sum.len() >= 3 {
                partials.push(sum);
            }
        }
    }

    match union_loops(partials) {
        Some(nfp) => NfpOutcome::Fit(nfp),
        None => NfpOutcome::Degenerate,
    }
}

fn union_loops(loops: Vec<Vec<Point>>) -> Option<Nfp> {
    if loops.is_empty() {
        return None;
    }
    match clipper::union_all(&loops) {
        Ok(shapes) => {
            let regions = regions_from_shapes(shapes);
            if regions.is_empty() {
                None
            } else {
                Some(Nfp { regions })
            }
        }
        Err(err) => {
            log::warn!("NFP union failed: {err}");
            None
        }
    }
}

// ============================================================================
// Inner NFP
// ============================================================================

/// Computes the inner NFP: translations of `part` (reference at its origin)
/// that keep it inside the container outline and clear of container holes.
pub fn inner_nfp(outer: &[Point], holes: &[Vec<Point>], part: &[Point]) -> NfpOutcome {
    if outer.len() < 3 {
        return NfpOutcome::NoFit;
    }
    let part = geometry::dedupe_polygon(&geometry::ensure_ccw(part), EPS);
    if part.len() < 3 {
        return NfpOutcome::Degenerate;
    }

    if holes.is_empty() && geometry::is_rectangle(outer, EPS) {
        return inner_nfp_rectangle(outer, &part);
    }
    inner_nfp_general(outer, holes, &part)
}

/// Bounds-difference fast path for rectangular containers.
fn inner_nfp_rectangle(outer: &[Point], part: &[Point]) -> NfpOutcome {
    let b = geometry::bounds(outer);
    let g = geometry::bounds(part);
    let width = b.width - g.width;
    let height = b.height - g.height;
    if width < -EPS || height < -EPS {
        return NfpOutcome::NoFit;
    }
    let width = width.max(0.0);
    let height = height.max(0.0);
    let min = Point::new(b.x - g.x, b.y - g.y);

    NfpOutcome::Fit(Nfp {
        regions: vec![Region::from_loop(vec![
            min,
            Point::new(min.x + width, min.y),
            Point::new(min.x + width, min.y + height),
            Point::new(min.x, min.y + height),
        ])],
    })
}

/// General inner NFP.
///
/// Feasible translations are those keeping an anchor vertex of the part
/// inside the container while the part never crosses the container boundary
/// or a hole. The crossing set is the boundary dilated by the reflected
/// part: for outline edges the hull of `edge ⊕ -triangle` per part triangle,
/// for holes the full Minkowski sum of hole and reflected part triangles.
/// Subtracting it from the anchored container region leaves the inner NFP,
/// islands included.
fn inner_nfp_general(outer: &[Point], holes: &[Vec<Point>], part: &[Point]) -> NfpOutcome {
    let outer = geometry::dedupe_polygon(&geometry::ensure_ccw(outer), EPS);
    if outer.len() < 3 {
        return NfpOutcome::NoFit;
    }

    let part_tris = triangulate(part);
    if part_tris.is_empty() {
        return NfpOutcome::Degenerate;
    }

    let anchor = part[0];
    let anchored = geometry::translate_polygon(&outer, -anchor.x, -anchor.y);

    let mut blocked: Vec<Vec<Point>> = Vec::new();
    let n = outer.len();
    for i in 0..n {
        let e1 = outer[i];
        let e2 = outer[(i + 1) % n];
        for tri in &part_tris {
            let mut points = Vec::with_capacity(tri.len() * 2);
            for t in tri {
                points.push(Point::new(e1.x - t.x, e1.y - t.y));
                points.push(Point::new(e2.x - t.x, e2.y - t.y));
            }
            let hull = geometry::convex_hull(&points);
            if hull.len() >= 3 {
                blocked.push(hull);
            }
        }
    }

    for hole in holes {
        for th in &triangulate(hole) {
            for tp in &part_tris {
                let sum = minkowski_sum_convex(th, &reflect(tp));
                if sum.len() >= 3 {
                    blocked.push(sum);
                }
            }
        }
    }

    let shapes = match clipper::difference(&[anchored], &blocked) {
        Ok(shapes) => shapes,
        Err(err) => {
            log::warn!("inner NFP difference failed: {err}");
            return NfpOutcome::NoFit;
        }
    };

    let regions = regions_from_shapes(shapes);
    if regions.is_empty() {
        NfpOutcome::NoFit
    } else {
        NfpOutcome::Fit(Nfp { regions })
    }
}

// ============================================================================
// Building blocks
// ============================================================================

/// Reflects a polygon through the origin. Orientation is preserved.
pub fn reflect(polygon: &[Point]) -> Vec<Point> {
    polygon.iter().map(|p| Point::new(-p.x, -p.y)).collect()
}

/// Rotates the vertex list so it starts at the bottom-most (then left-most)
/// vertex.
fn rotate_to_start(polygon: &[Point]) -> Vec<Point> {
    let mut start = 0;
    for (i, p) in polygon.iter().enumerate() {
        let s = polygon[start];
        if p.y < s.y - EPS || ((p.y - s.y).abs() <= EPS && p.x < s.x - EPS) {
            start = i;
        }
    }
    polygon[start..]
        .iter()
        .chain(polygon[..start].iter())
        .copied()
        .collect()
}

/// Minkowski sum of two convex CCW polygons by merging their edge lists in
/// angular order. O(n + m).
pub fn minkowski_sum_convex(a: &[Point], b: &[Point]) -> Vec<Point> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let a = rotate_to_start(&geometry::ensure_ccw(a));
    let b = rotate_to_start(&geometry::ensure_ccw(b));
    let n = a.len();
    let m = b.len();

    let mut result = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0usize, 0usize);
    while i < n || j < m {
        result.push(Point::new(a[i % n].x + b[j % m].x, a[i % n].y + b[j % m].y));
        if j >= m {
            i += 1;
            continue;
        }
        if i >= n {
            j += 1;
            continue;
        }
        let ea = (a[(i + 1) % n].x - a[i].x, a[(i + 1) % n].y - a[i].y);
        let eb = (b[(j + 1) % m].x - b[j].x, b[(j + 1) % m].y - b[j].y);
        let cross = ea.0 * eb.1 - ea.1 * eb.0;
        if cross > 1e-12 {
            i += 1;
        } else if cross < -1e-12 {
            j += 1;
        } else {
            i += 1;
            j += 1;
        }
    }
    geometry::dedupe_polygon(&result, EPS)
}

/// Ear-clipping triangulation. Convex polygons are returned whole; a stalled
/// clip (degenerate outline) falls back to the convex hull.
pub fn triangulate(polygon: &[Point]) -> Vec<Vec<Point>> {
    let poly = geometry::dedupe_polygon(&geometry::ensure_ccw(polygon), EPS);
    if poly.len() < 3 {
        return Vec::new();
    }
    if geometry::is_convex(&poly) {
        return vec![poly];
    }

    let mut vertices = poly;
    let mut triangles = Vec::new();
    while vertices.len() > 3 {
        let n = vertices.len();
        let mut clipped = false;
        for i in 0..n {
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            if is_ear(&vertices, prev, i, next) {
                triangles.push(vec![vertices[prev], vertices[i], vertices[next]]);
                vertices.remove(i);
                clipped = true;
                break;
            }
        }
        if !clipped {
            log::warn!("ear clipping stalled on a degenerate outline; using the convex hull");
            return vec![geometry::convex_hull(polygon)];
        }
    }
    triangles.push(vertices);
    triangles
}

fn is_ear(vertices: &[Point], prev: usize, curr: usize, next: usize) -> bool {
    let a = vertices[prev];
    let b = vertices[curr];
    let c = vertices[next];
    if !geometry::orient2d(a, b, c).is_ccw() {
        return false;
    }
    for (i, &p) in vertices.iter().enumerate() {
        if i == prev || i == curr || i == next {
            continue;
        }
        if point_in_triangle(p, a, b, c) {
            return false;
        }
    }
    true
}

fn point_in_triangle(p: Point, a: Point, b: Point, c: Point) -> bool {
    let o1 = geometry::orient2d(a, b, p);
    let o2 = geometry::orient2d(b, c, p);
    let o3 = geometry::orient2d(c, a, p);
    (o1.is_ccw() && o2.is_ccw() && o3.is_ccw()) || (o1.is_cw() && o2.is_cw() && o3.is_cw())
}

/// Converts clipper output into regions with normalised (CCW, deduplicated)
/// loops.
pub fn regions_from_shapes(shapes: Vec<Vec<Vec<Point>>>) -> Vec<Region> {
    shapes
        .into_iter()
        .filter_map(|mut shape| {
            if shape.is_empty() {
                return None;
            }
            let outer = geometry::ensure_ccw(&shape.remove(0));
            let holes = shape.into_iter().map(|h| geometry::ensure_ccw(&h)).collect();
            Some(Region { outer, holes })
        })
        .collect()
}
