//! Orbital sliding NFP (Burke et al. style).
//!
//! Traces the outer NFP by keeping the orbiting polygon in sliding contact
//! with the stationary one and recording the trajectory of its reference
//! vertex. Used for non-convex pairs when `explore_concave` is enabled;
//! concave pockets of the stationary polygon get their own seeded orbits and
//! the caller unions the resulting loops.
//!
//! Contact classification follows the usual three cases: an orbiting vertex
//! on a stationary edge, a stationary vertex on an orbiting edge, and
//! parallel touching edges.

use std::fmt;

use crate::geometry::{self, Point, EPS};

/// Contact tolerance while sliding.
const CONTACT_TOL: f64 = 1e-6;

/// Why an orbit could not be produced.
#[derive(Debug)]
pub enum SlideError {
    /// The reference vertex did not return to its start within the iteration
    /// budget.
    OpenOrbit { iterations: usize },
    /// Inputs unusable for sliding.
    Degenerate,
}

impl fmt::Display for SlideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlideError::OpenOrbit { iterations } => {
                write!(f, "orbit failed to close within {iterations} iterations")
            }
            SlideError::Degenerate => write!(f, "degenerate polygon"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContactKind {
    /// Orbiting vertex touches a stationary edge.
    VertexEdge,
    /// Stationary vertex touches an orbiting edge.
    EdgeVertex,
    /// Parallel overlapping edges.
    EdgeEdge,
}

#[derive(Debug, Clone, Copy)]
struct Contact {
    kind: ContactKind,
    /// Vertex or edge-start index on the stationary polygon.
    stationary_idx: usize,
    /// Vertex or edge-start index on the orbiting polygon.
    orbiting_idx: usize,
    point: Point,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    direction: (f64, f64),
    distance: f64,
}

#[inline]
fn edge_vector(polygon: &[Point], i: usize) -> (f64, f64) {
    let n = polygon.len();
    let a = polygon[i];
    let b = polygon[(i + 1) % n];
    (b.x - a.x, b.y - a.y)
}

#[inline]
fn normalize(v: (f64, f64)) -> (f64, f64) {
    let len = (v.0 * v.0 + v.1 * v.1).sqrt();
    if len < 1e-12 {
        (0.0, 0.0)
    } else {
        (v.0 / len, v.1 / len)
    }
}

#[inline]
fn dot(a: (f64, f64), b: (f64, f64)) -> f64 {
    a.0 * b.0 + a.1 * b.1
}

#[inline]
fn cross(a: (f64, f64), b: (f64, f64)) -> f64 {
    a.0 * b.1 - a.1 * b.0
}

/// All contacts between the stationary polygon and the orbiting polygon at
/// its current position.
fn contacts_at(stationary: &[Point], orbiting: &[Point], tol: f64) -> Vec<Contact> {
    let ns = stationary.len();
    let no = orbiting.len();
    let mut contacts = Vec::new();

    for (oi, &ov) in orbiting.iter().enumerate() {
        for si in 0..ns {
            if geometry::point_segment_distance(ov, stationary[si], stationary[(si + 1) % ns]) < tol
            {
                contacts.push(Contact {
                    kind: ContactKind::VertexEdge,
                    stationary_idx: si,
                    orbiting_idx: oi,
                    point: ov,
                });
            }
        }
    }

    for (si, &sv) in stationary.iter().enumerate() {
        for oi in 0..no {
            if geometry::point_segment_distance(sv, orbiting[oi], orbiting[(oi + 1) % no]) < tol {
                contacts.push(Contact {
                    kind: ContactKind::EdgeVertex,
                    stationary_idx: si,
                    orbiting_idx: oi,
                    point: sv,
                });
            }
        }
    }

    for si in 0..ns {
        let se = edge_vector(stationary, si);
        for oi in 0..no {
            let oe = edge_vector(orbiting, oi);
            if cross(se, oe).abs() > 1e-9 * (se.0.hypot(se.1)) * (oe.0.hypot(oe.1)) {
                continue;
            }
            let o1 = orbiting[oi];
            let o2 = orbiting[(oi + 1) % no];
            let s1 = stationary[si];
            let s2 = stationary[(si + 1) % ns];
            if geometry::point_segment_distance(o1, s1, s2) < tol
                && geometry::point_segment_distance(o2, s1, s2) < tol
            {
                contacts.push(Contact {
                    kind: ContactKind::EdgeEdge,
                    stationary_idx: si,
                    orbiting_idx: oi,
                    point: Point::new((o1.x + o2.x) / 2.0, (o1.y + o2.y) / 2.0),
                });
            }
        }
    }

    contacts
}

/// Sliding directions generated by a set of contacts.
fn translation_candidates(
    contacts: &[Contact],
    stationary: &[Point],
    orbiting: &[Point],
) -> Vec<Candidate> {
    let ns = stationary.len();
    let no = orbiting.len();
    let mut out = Vec::with_capacity(contacts.len() * 2);

    for c in contacts {
        match c.kind {
            ContactKind::VertexEdge => {
                // Slide along the stationary edge, clamped at its endpoints.
                let dir = normalize(edge_vector(stationary, c.stationary_idx));
                let start = stationary[c.stationary_idx];
                let end = stationary[(c.stationary_idx + 1) % ns];
                out.push(Candidate {
                    direction: dir,
                    distance: c.point.distance(end),
                });
                out.push(Candidate {
                    direction: (-dir.0, -dir.1),
                    distance: c.point.distance(start),
                });
            }
            ContactKind::EdgeVertex => {
                // The stationary vertex stays on the orbiting edge, so the
                // orbiting polygon moves opposite to its own edge direction.
                let dir = normalize(edge_vector(orbiting, c.orbiting_idx));
                let start = orbiting[c.orbiting_idx];
                let end = orbiting[(c.orbiting_idx + 1) % no];
                out.push(Candidate {
                    direction: (-dir.0, -dir.1),
                    distance: c.point.distance(end),
                });
                out.push(Candidate {
                    direction: dir,
                    distance: c.point.distance(start),
                });
            }
            ContactKind::EdgeEdge => {
                let dir = normalize(edge_vector(stationary, c.stationary_idx));
                let se = edge_vector(stationary, c.stationary_idx);
                let oe = edge_vector(orbiting, c.orbiting_idx);
                let span = se.0.hypot(se.1) + oe.0.hypot(oe.1);
                out.push(Candidate {
                    direction: dir,
                    distance: span,
                });
                out.push(Candidate {
                    direction: (-dir.0, -dir.1),
                    distance: span,
                });
            }
        }
    }

    out
}

/// Picks the candidate that keeps the orbit moving counter-clockwise around
/// the stationary polygon, with a bonus for continuing the previous
/// direction.
fn select_candidate(
    candidates: &[Candidate],
    previous: Option<(f64, f64)>,
    stationary_centroid: Point,
    position: Point,
) -> Option<Candidate> {
    let radial = normalize((
        position.x - stationary_centroid.x,
        position.y - stationary_centroid.y,
    ));
    let ccw_preferred = (-radial.1, radial.0);

    let mut best: Option<(f64, Candidate)> = None;
    for &c in candidates {
        let mut score = dot(c.direction, ccw_preferred);
        if let Some(prev) = previous {
            score += 0.5 * dot(c.direction, prev);
        }
        if c.distance < 1e-6 {
            score -= 100.0;
        }
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, c));
        }
    }
    best.map(|(_, c)| c)
}

/// Distance along `dir` from `origin` until the ray meets the segment.
fn ray_segment_hit(origin: Point, dir: (f64, f64), s1: Point, s2: Point) -> Option<f64> {
    let seg = (s2.x - s1.x, s2.y - s1.y);
    let denom = cross(dir, seg);
    if denom.abs() < 1e-12 {
        return None;
    }
    let diff = (s1.x - origin.x, s1.y - origin.y);
    let t = cross(diff, seg) / denom;
    let u = cross(diff, dir) / denom;
    if t >= -CONTACT_TOL && (-CONTACT_TOL..=1.0 + CONTACT_TOL).contains(&u) {
        Some(t.max(0.0))
    } else {
        None
    }
}

/// Clamps an intended translation at the first collision between the moving
/// orbiting polygon and the stationary one.
fn clamp_translation(
    stationary: &[Point],
    orbiting: &[Point],
    direction: (f64, f64),
    distance: f64,
) -> f64 {
    let ns = stationary.len();
    let no = orbiting.len();
    let mut clamped = distance;

    for &ov in orbiting {
        for si in 0..ns {
            if let Some(hit) =
                ray_segment_hit(ov, direction, stationary[si], stationary[(si + 1) % ns])
            {
                if hit > CONTACT_TOL && hit < clamped - CONTACT_TOL {
                    clamped = hit;
                }
            }
        }
    }

    let reverse = (-direction.0, -direction.1);
    for &sv in stationary {
        for oi in 0..no {
            if let Some(hit) = ray_segment_hit(sv, reverse, orbiting[oi], orbiting[(oi + 1) % no]) {
                if hit > CONTACT_TOL && hit < clamped - CONTACT_TOL {
                    clamped = hit;
                }
            }
        }
    }

    clamped
}

/// Traces one orbit of `b` around `a` starting at translation `start`.
fn orbit(a: &[Point], b: &[Point], start: Point, max_iterations: usize) -> Result<Vec<Point>, SlideError> {
    let centroid = geometry::centroid(a);
    let mut position = start;
    let mut previous: Option<(f64, f64)> = None;
    let mut path = vec![position];

    for _ in 0..max_iterations {
        let world: Vec<Point> = geometry::translate_polygon(b, position.x, position.y);
        let contacts = contacts_at(a, &world, CONTACT_TOL);
        if contacts.is_empty() {
            return Err(SlideError::OpenOrbit {
                iterations: max_iterations,
            });
        }

        // Drop candidates that walk straight back onto the recorded path,
        // except toward the start once the loop is nearly complete.
        let mut candidates = translation_candidates(&contacts, a, &world);
        if path.len() > 1 {
            candidates.retain(|c| {
                let probe = Point::new(
                    position.x + c.direction.0 * c.distance.min(1.0),
                    position.y + c.direction.1 * c.distance.min(1.0),
                );
                let revisits = path[1..]
                    .iter()
                    .any(|p| p.distance(probe) < CONTACT_TOL * 10.0);
                !revisits
            });
        }

        let Some(chosen) = select_candidate(&candidates, previous, centroid, position) else {
            return Err(SlideError::OpenOrbit {
                iterations: max_iterations,
            });
        };
        if chosen.distance < 1e-8 {
            return Err(SlideError::OpenOrbit {
                iterations: max_iterations,
            });
        }

        let step = clamp_translation(a, &world, chosen.direction, chosen.distance);
        let next = Point::new(
            position.x + chosen.direction.0 * step,
            position.y + chosen.direction.1 * step,
        );

        if path.len() > 2 && next.distance(start) < CONTACT_TOL * 10.0 {
            return simplify_loop(&path);
        }

        if next.distance(position) > 1e-8 {
            path.push(next);
            previous = Some(chosen.direction);
        }
        position = next;
    }

    Err(SlideError::OpenOrbit {
        iterations: max_iterations,
    })
}

/// Removes collinear and duplicate points from a traced loop.
fn simplify_loop(path: &[Point]) -> Result<Vec<Point>, SlideError> {
    let deduped = geometry::dedupe_polygon(path, CONTACT_TOL);
    if deduped.len() < 3 {
        return Err(SlideError::Degenerate);
    }
    let n = deduped.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let prev = deduped[(i + n - 1) % n];
        let next = deduped[(i + 1) % n];
        if !geometry::orient2d(prev, deduped[i], next).is_collinear() {
            out.push(deduped[i]);
        }
    }
    if out.len() < 3 {
        Err(SlideError::Degenerate)
    } else {
        Ok(out)
    }
}

/// Index of the maximum-y (tie-break minimum-x) vertex.
fn top_vertex(polygon: &[Point]) -> usize {
    let mut idx = 0;
    for (i, p) in polygon.iter().enumerate() {
        let best = polygon[idx];
        if p.y > best.y + EPS || ((p.y - best.y).abs() <= EPS && p.x < best.x - EPS) {
            idx = i;
        }
    }
    idx
}

/// Index of the minimum-y (tie-break minimum-x) vertex: the reference vertex
/// of the orbiting polygon.
fn reference_vertex(polygon: &[Point]) -> usize {
    let mut idx = 0;
    for (i, p) in polygon.iter().enumerate() {
        let best = polygon[idx];
        if p.y < best.y - EPS || ((p.y - best.y).abs() <= EPS && p.x < best.x - EPS) {
            idx = i;
        }
    }
    idx
}

/// Reflex (concave) vertex indices of a CCW polygon.
fn reflex_vertices(polygon: &[Point]) -> Vec<usize> {
    let n = polygon.len();
    (0..n)
        .filter(|&i| {
            geometry::orient2d(
                polygon[(i + n - 1) % n],
                polygon[i],
                polygon[(i + 1) % n],
            )
            .is_cw()
        })
        .collect()
}

/// Computes the outer NFP of `a` and `b` by orbital sliding.
///
/// Returns the main orbit plus any loops traced from concave-pocket seeds.
/// The caller is expected to union the loops.
pub fn orbital_nfp(a: &[Point], b: &[Point]) -> Result<Vec<Vec<Point>>, SlideError> {
    let a = geometry::dedupe_polygon(&geometry::ensure_ccw(a), EPS);
    let b = geometry::dedupe_polygon(&geometry::ensure_ccw(b), EPS);
    if a.len() < 3 || b.len() < 3 {
        return Err(SlideError::Degenerate);
    }

    let budget = 16 * (a.len() + b.len());
    let a_top = a[top_vertex(&a)];
    let b_ref = b[reference_vertex(&b)];

    // Start with the orbiting reference vertex touching the stationary
    // maximum-y vertex from above.
    let start = Point::new(a_top.x - b_ref.x, a_top.y - b_ref.y);
    let main = orbit(&a, &b, start, budget)?;

    let mut loops = vec![main];
    for seed in pocket_seeds(&a, &b) {
        let visited = loops
            .iter()
            .any(|loop_| geometry::point_in_polygon(seed, loop_));
        if visited {
            continue;
        }
        match orbit(&a, &b, seed, budget) {
            Ok(pocket_loop) => loops.push(pocket_loop),
            Err(err) => log::debug!("pocket orbit skipped: {err}"),
        }
    }

    Ok(loops)
}

/// Candidate start translations inside concave pockets of `a`: positions
/// where `b` touches the stationary polygon without overlapping it.
fn pocket_seeds(a: &[Point], b: &[Point]) -> Vec<Point> {
    let n = a.len();
    let b_centroid = geometry::centroid(b);
    let b_bounds = geometry::bounds(b);
    let b_span = b_bounds.width.max(b_bounds.height);

    let mut seeds = Vec::new();
    for i in reflex_vertices(a) {
        let prev = a[(i + n - 1) % n];
        let vertex = a[i];
        let next = a[(i + 1) % n];

        // Direction out of the material, into the pocket.
        let into_pocket = normalize((
            normalize((prev.x - vertex.x, prev.y - vertex.y)).0
                + normalize((next.x - vertex.x, next.y - vertex.y)).0,
            normalize((prev.x - vertex.x, prev.y - vertex.y)).1
                + normalize((next.x - vertex.x, next.y - vertex.y)).1,
        ));
        if into_pocket == (0.0, 0.0) {
            continue;
        }

        for step in [0.35, 0.6, 1.0] {
            let probe = Point::new(
                vertex.x + into_pocket.0 * b_span * step,
                vertex.y + into_pocket.1 * b_span * step,
            );
            let translation = Point::new(probe.x - b_centroid.x, probe.y - b_centroid.y);
            let world = geometry::translate_polygon(b, translation.x, translation.y);
            if geometry::polygons_overlap(a, &world) {
                continue;
            }
            if !contacts_at(a, &world, CONTACT_TOL * 100.0).is_empty() {
                seeds.push(translation);
                break;
            }
        }
    }
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{area, bounds};

    fn rect(w: f64, h: f64) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ]
    }

    #[test]
    fn test_contacts_vertex_edge() {
        let a = rect(10.0, 10.0);
        let b = geometry::translate_polygon(&rect(5.0, 5.0), 2.0, 10.0);
        let contacts = contacts_at(&a, &b, CONTACT_TOL);
        assert!(!contacts.is_empty());
        assert!(contacts
            .iter()
            .any(|c| matches!(c.kind, ContactKind::VertexEdge)));
    }

    #[test]
    fn test_no_contacts_when_apart() {
        let a = rect(10.0, 10.0);
        let b = geometry::translate_polygon(&rect(5.0, 5.0), 30.0, 0.0);
        assert!(contacts_at(&a, &b, CONTACT_TOL).is_empty());
    }

    #[test]
    fn test_translation_candidates_exist() {
        let a = rect(10.0, 10.0);
        let b = geometry::translate_polygon(&rect(5.0, 5.0), 2.5, 10.0);
        let contacts = contacts_at(&a, &b, CONTACT_TOL);
        let candidates = translation_candidates(&contacts, &a, &b);
        assert!(!candidates.is_empty());
    }

    #[test]
    fn test_ray_segment_hit() {
        let hit = ray_segment_hit(
            Point::new(0.0, 0.0),
            (1.0, 0.0),
            Point::new(5.0, -1.0),
            Point::new(5.0, 1.0),
        );
        assert!((hit.unwrap() - 5.0).abs() < 1e-9);

        let miss = ray_segment_hit(
            Point::new(0.0, 0.0),
            (-1.0, 0.0),
            Point::new(5.0, -1.0),
            Point::new(5.0, 1.0),
        );
        assert!(miss.is_none());
    }

    #[test]
    fn test_clamp_translation_stops_at_wall() {
        let a = rect(10.0, 10.0);
        let b = geometry::translate_polygon(&rect(5.0, 5.0), 15.0, 2.0);
        let clamped = clamp_translation(&a, &b, (-1.0, 0.0), 20.0);
        assert!(
            (clamped - 5.0).abs() < 1e-6,
            "expected to stop after 5, got {clamped}"
        );
    }

    #[test]
    fn test_orbit_two_squares() {
        let a = rect(10.0, 10.0);
        let b = rect(5.0, 5.0);
        let loops = orbital_nfp(&a, &b).expect("orbit must close for squares");

        assert_eq!(loops.len(), 1);
        let loop_ = &loops[0];
        assert!(loop_.len() >= 4, "loop has {} points", loop_.len());

        // The reference trajectory must enclose the stationary square.
        let b_ = bounds(loop_);
        assert!(b_.width >= 10.0 - 1e-3);
        assert!(b_.height >= 10.0 - 1e-3);
        assert!(area(loop_) > area(&a));
    }

    #[test]
    fn test_orbit_triangle() {
        let a = vec![
            Point::new(0.0, 0.0),
            Point::new(12.0, 0.0),
            Point::new(6.0, 9.0),
        ];
        let b = rect(4.0, 4.0);
        let loops = orbital_nfp(&a, &b).expect("orbit must close for a triangle");
        assert!(loops[0].len() >= 3);
    }

    #[test]
    fn test_reflex_vertices() {
        let l_shape: Vec<Point> = [
            (0.0, 0.0),
            (20.0, 0.0),
            (20.0, 5.0),
            (5.0, 5.0),
            (5.0, 20.0),
            (0.0, 20.0),
        ]
        .iter()
        .map(|&p| Point::from(p))
        .collect();
        let reflex = reflex_vertices(&l_shape);
        assert_eq!(reflex, vec![3]);

        assert!(reflex_vertices(&rect(10.0, 10.0)).is_empty());
    }

    #[test]
    fn test_orbit_l_shape() {
        let l_shape: Vec<Point> = [
            (0.0, 0.0),
            (30.0, 0.0),
            (30.0, 8.0),
            (8.0, 8.0),
            (8.0, 30.0),
            (0.0, 30.0),
        ]
        .iter()
        .map(|&p| Point::from(p))
        .collect();
        let b = rect(4.0, 4.0);
        let loops = orbital_nfp(&l_shape, &b).expect("orbit must close for the L");
        assert!(!loops.is_empty());
        assert!(loops[0].len() >= 6);
    }
}
