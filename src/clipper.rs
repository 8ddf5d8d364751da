//! Boolean polygon operations and offsetting.
//!
//! Thin bridge over `i_overlay`. Coordinates are snapped to a fixed integer
//! grid (scale 1e7) on the way in and out of every operation so results are
//! reproducible and free of near-duplicate vertices. Offsetting uses miter
//! joins with a fixed limit and cleans its raw ring through a union pass, so
//! inward offsets that pinch the outline resolve to proper loops.

use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;

use crate::error::{Error, Result};
use crate::geometry::{self, Point, EPS};

/// Integer scaling factor applied around clipping operations.
pub const CLIPPER_SCALE: f64 = 1e7;

/// Miter limit for offset joins, in multiples of the offset delta.
const MITER_LIMIT: f64 = 2.0;

/// Largest coordinate magnitude whose scaled value is still exact in an f64.
const MAX_COORD: f64 = 9.0e15 / CLIPPER_SCALE;

/// Snaps a coordinate onto the integer grid.
#[inline]
fn snap(v: f64) -> f64 {
    (v * CLIPPER_SCALE).round() / CLIPPER_SCALE
}

fn to_contour(polygon: &[Point]) -> Result<Vec<[f64; 2]>> {
    let mut contour = Vec::with_capacity(polygon.len());
    for p in polygon {
        if p.x.abs() > MAX_COORD || p.y.abs() > MAX_COORD {
            return Err(Error::Infeasible(format!(
                "coordinate ({}, {}) exceeds the clipper range",
                p.x, p.y
            )));
        }
        contour.push([snap(p.x), snap(p.y)]);
    }
    Ok(contour)
}

fn to_shapes(polygons: &[Vec<Point>]) -> Result<Vec<Vec<[f64; 2]>>> {
    polygons.iter().map(|p| to_contour(p)).collect()
}

/// Converts `i_overlay` output back into point loops, dropping slivers.
///
/// Each inner vector is one connected region: first contour is the outer
/// loop, the rest are holes.
fn from_shapes(shapes: Vec<Vec<Vec<[f64; 2]>>>) -> Vec<Vec<Vec<Point>>> {
    shapes
        .into_iter()
        .filter_map(|shape| {
            let mut contours = shape.into_iter();
            // A shape whose outer contour degenerates is dropped entirely,
            // holes included.
            let outer = clean_contour(contours.next()?)?;
            let mut cleaned = vec![outer];
            cleaned.extend(contours.filter_map(clean_contour));
            Some(cleaned)
        })
        .collect()
}

fn clean_contour(contour: Vec<[f64; 2]>) -> Option<Vec<Point>> {
    let points: Vec<Point> = contour
        .into_iter()
        .map(|[x, y]| Point::new(snap(x), snap(y)))
        .collect();
    let points = geometry::dedupe_polygon(&points, EPS);
    if points.len() >= 3 && geometry::area(&points) > EPS {
        Some(points)
    } else {
        None
    }
}

/// Unions a set of closed loops into disjoint regions.
///
/// Loops are folded into the accumulator one at a time. Input loops are
/// forced counter-clockwise so overlapping loops accumulate winding instead
/// of cancelling; the first pass also resolves a self-intersecting input
/// ring.
pub fn union_all(polygons: &[Vec<Point>]) -> Result<Vec<Vec<Vec<Point>>>> {
    let loops: Vec<Vec<Point>> = polygons
        .iter()
        .filter(|p| p.len() >= 3)
        .map(|p| geometry::ensure_ccw(p))
        .collect();
    if loops.is_empty() {
        return Ok(Vec::new());
    }

    let first = to_contour(&loops[0])?;
    let mut shapes = first.overlay(&[first.clone()], OverlayRule::Union, FillRule::NonZero);

    for loop_ in &loops[1..] {
        let clip = to_contour(loop_)?;
        let flat: Vec<Vec<[f64; 2]>> = shapes.into_iter().flatten().collect();
        shapes = flat.overlay(&[clip], OverlayRule::Union, FillRule::NonZero);
    }

    Ok(from_shapes(shapes))
}

/// Subtracts solid `clip` loops from the `subject` region, one at a time.
///
/// The subject is one region given as outer loop plus holes; each clip loop
/// must be a solid outline (no hole contours), but clip loops may overlap
/// each other freely. Even-odd filling keeps the subject's nesting
/// independent of winding direction.
pub fn difference(subject: &[Vec<Point>], clips: &[Vec<Point>]) -> Result<Vec<Vec<Vec<Point>>>> {
    let subject_shapes = to_shapes(subject)?;
    if clips.is_empty() {
        return Ok(from_shapes(vec![subject_shapes]));
    }

    let mut shapes = vec![subject_shapes];
    for clip_loop in clips {
        if clip_loop.len() < 3 {
            continue;
        }
        let clip = to_contour(clip_loop)?;
        let flat: Vec<Vec<[f64; 2]>> = shapes.into_iter().flatten().collect();
        if flat.is_empty() {
            return Ok(Vec::new());
        }
        shapes = flat.overlay(&[clip], OverlayRule::Difference, FillRule::EvenOdd);
    }

    Ok(from_shapes(shapes))
}

/// Offsets a closed polygon by `delta` (positive = outward, negative =
/// inward) using miter joins.
///
/// The raw mitered ring may self-intersect for concave outlines or large
/// inward deltas; a union pass resolves it. When the offset splits the
/// outline into several pieces the largest piece is kept. Returns
/// `Err(Infeasible)` when the polygon collapses entirely.
pub fn offset_polygon(polygon: &[Point], delta: f64) -> Result<Vec<Point>> {
    if delta.abs() < EPS {
        return Ok(polygon.to_vec());
    }
    let poly = geometry::dedupe_polygon(&geometry::ensure_ccw(polygon), EPS);
    let n = poly.len();
    if n < 3 {
        return Err(Error::Infeasible(
            "cannot offset a polygon with fewer than 3 vertices".into(),
        ));
    }

    // Outward unit normal per edge of a CCW ring.
    let normals: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let a = poly[i];
            let b = poly[(i + 1) % n];
            let dx = b.x - a.x;
            let dy = b.y - a.y;
            let len = (dx * dx + dy * dy).sqrt();
            if len < EPS {
                (0.0, 0.0)
            } else {
                (dy / len, -dx / len)
            }
        })
        .collect();

    let mut ring: Vec<Point> = Vec::with_capacity(n + 4);
    for i in 0..n {
        let prev = (i + n - 1) % n;
        let v = poly[i];
        let np = normals[prev];
        let ni = normals[i];

        let a1 = Point::new(poly[prev].x + np.0 * delta, poly[prev].y + np.1 * delta);
        let a2 = Point::new(v.x + np.0 * delta, v.y + np.1 * delta);
        let b1 = Point::new(v.x + ni.0 * delta, v.y + ni.1 * delta);
        let b2 = Point::new(
            poly[(i + 1) % n].x + ni.0 * delta,
            poly[(i + 1) % n].y + ni.1 * delta,
        );

        match line_intersection(a1, a2, b1, b2) {
            Some(miter) if v.distance(miter) <= delta.abs() * MITER_LIMIT => {
                ring.push(miter);
            }
            _ => {
                // Parallel edges or miter beyond the limit: bevel the corner.
                ring.push(a2);
                ring.push(b1);
            }
        }
    }

    let regions = union_all(&[ring])?;
    let outer = regions
        .iter()
        .flat_map(|shape| shape.first())
        .max_by(|a, b| {
            geometry::area(a)
                .partial_cmp(&geometry::area(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

    match outer {
        Some(loop_) if geometry::area(loop_) > EPS => {
            if regions.len() > 1 {
                log::warn!(
                    "offset by {} split the polygon into {} pieces; keeping the largest",
                    delta,
                    regions.len()
                );
            }
            Ok(geometry::ensure_ccw(loop_))
        }
        _ => Err(Error::Infeasible(format!(
            "polygon collapsed under offset {}",
            delta
        ))),
    }
}

/// Intersection of the infinite lines through `a1 -> a2` and `b1 -> b2`.
fn line_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let r = (a2.x - a1.x, a2.y - a1.y);
    let s = (b2.x - b1.x, b2.y - b1.y);
    let denom = r.0 * s.1 - r.1 * s.0;
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = ((b1.x - a1.x) * s.1 - (b1.y - a1.y) * s.0) / denom;
    Some(Point::new(a1.x + t * r.0, a1.y + t * r.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{area, bounds, translate_polygon};
    use approx::assert_relative_eq;

    fn rect(w: f64, h: f64) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ]
    }

    #[test]
    fn test_offset_square_outward() {
        let out = offset_polygon(&rect(40.0, 40.0), 2.5).unwrap();
        let b = bounds(&out);
        assert_relative_eq!(b.x, -2.5, epsilon = 1e-6);
        assert_relative_eq!(b.y, -2.5, epsilon = 1e-6);
        assert_relative_eq!(b.width, 45.0, epsilon = 1e-6);
        assert_relative_eq!(b.height, 45.0, epsilon = 1e-6);
    }

    #[test]
    fn test_offset_square_inward() {
        let out = offset_polygon(&rect(100.0, 100.0), -2.5).unwrap();
        let b = bounds(&out);
        assert_relative_eq!(b.x, 2.5, epsilon = 1e-6);
        assert_relative_eq!(b.width, 95.0, epsilon = 1e-6);
    }

    #[test]
    fn test_offset_collapse_is_infeasible() {
        let result = offset_polygon(&rect(10.0, 10.0), -6.0);
        assert!(result.is_err());
    }

    #[test]
    fn test_offset_zero_is_identity() {
        let square = rect(10.0, 10.0);
        let out = offset_polygon(&square, 0.0).unwrap();
        assert_eq!(out.len(), 4);
        assert_relative_eq!(area(&out), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_offset_triangle_area_grows() {
        let tri = vec![
            Point::new(0.0, 0.0),
            Point::new(30.0, 0.0),
            Point::new(15.0, 25.0),
        ];
        let out = offset_polygon(&tri, 2.0).unwrap();
        assert!(area(&out) > area(&tri));
    }

    #[test]
    fn test_union_overlapping_squares() {
        let a = rect(10.0, 10.0);
        let b = translate_polygon(&rect(10.0, 10.0), 5.0, 0.0);
        let regions = union_all(&[a, b]).unwrap();

        assert_eq!(regions.len(), 1);
        assert_relative_eq!(area(&regions[0][0]), 150.0, epsilon = 1e-4);
    }

    #[test]
    fn test_union_disjoint_squares() {
        let a = rect(10.0, 10.0);
        let b = translate_polygon(&rect(10.0, 10.0), 30.0, 0.0);
        let regions = union_all(&[a, b]).unwrap();
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn test_difference_carves_hole() {
        let outer = rect(100.0, 100.0);
        let clip = translate_polygon(&rect(20.0, 20.0), 40.0, 40.0);
        let regions = difference(&[outer], &[clip]).unwrap();

        assert_eq!(regions.len(), 1);
        // Outer loop plus one hole.
        assert_eq!(regions[0].len(), 2);
        let net: f64 = area(&regions[0][0]) - area(&regions[0][1]);
        assert_relative_eq!(net, 10000.0 - 400.0, epsilon = 1e-4);
    }

    #[test]
    fn test_difference_splits_region() {
        let outer = rect(100.0, 20.0);
        // A clip band cutting the strip in two.
        let clip = translate_polygon(&rect(10.0, 40.0), 45.0, -10.0);
        let regions = difference(&[outer], &[clip]).unwrap();
        assert_eq!(regions.len(), 2);
    }
}
