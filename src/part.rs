//! Parts and containers as the engine sees them.
//!
//! All outlines here are already validated, normalised (bounding-box min
//! corner at the origin, counter-clockwise winding) and spacing-offset by the
//! orchestrator. Holes are stored as child loops; they only participate in
//! placement when `use_holes` is enabled, but always count against a
//! container.

use serde::{Deserialize, Serialize};

use crate::geometry::{self, Bounds, Point};

/// Stable ID used for the container in NFP cache keys.
pub const CONTAINER_ID: i64 = -1;

/// A part to nest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub id: i64,
    /// Outer ring, normalised to the origin.
    pub polygon: Vec<Point>,
    /// Hole rings, in the same frame as `polygon`.
    pub holes: Vec<Vec<Point>>,
    /// Area of the outer ring.
    pub area: f64,
    pub bounds: Bounds,
}

impl Part {
    pub fn new(id: i64, polygon: Vec<Point>, holes: Vec<Vec<Point>>) -> Self {
        let area = geometry::area(&polygon);
        let bounds = geometry::bounds(&polygon);
        Self {
            id,
            polygon,
            holes,
            area,
            bounds,
        }
    }

    /// The part rotated by `degrees` around the origin, with cached bounds.
    pub fn rotated(&self, degrees: f64) -> RotatedPart {
        let polygon = geometry::rotate_polygon(&self.polygon, degrees);
        let holes = self
            .holes
            .iter()
            .map(|h| geometry::rotate_polygon(h, degrees))
            .collect();
        let bounds = geometry::bounds(&polygon);
        RotatedPart {
            part_id: self.id,
            rotation: degrees,
            polygon,
            holes,
            bounds,
            area: self.area,
        }
    }
}

/// A part at a fixed rotation, ready for placement.
#[derive(Debug, Clone)]
pub struct RotatedPart {
    pub part_id: i64,
    /// Rotation in degrees.
    pub rotation: f64,
    pub polygon: Vec<Point>,
    pub holes: Vec<Vec<Point>>,
    pub bounds: Bounds,
    pub area: f64,
}

/// The sheet that parts are placed into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    /// Working outline: normalised and, when spacing is configured, offset
    /// inward. Empty when the inward offset collapsed the sheet, in which
    /// case nothing is placeable.
    pub polygon: Vec<Point>,
    /// Hole rings of the sheet; parts must never overlap these.
    pub holes: Vec<Vec<Point>>,
    /// Area of the outline before the spacing offset, used for utilization.
    pub gross_area: f64,
    pub bounds: Bounds,
}

impl Container {
    pub fn new(polygon: Vec<Point>, holes: Vec<Vec<Point>>, gross_area: f64) -> Self {
        let bounds = geometry::bounds(&polygon);
        Self {
            polygon,
            holes,
            gross_area,
            bounds,
        }
    }

    /// True when the spacing offset left no usable sheet.
    pub fn is_degenerate(&self) -> bool {
        self.polygon.len() < 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(w: f64) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, w),
            Point::new(0.0, w),
        ]
    }

    #[test]
    fn test_part_caches_area_and_bounds() {
        let part = Part::new(0, square(10.0), Vec::new());
        assert_relative_eq!(part.area, 100.0, epsilon = 1e-10);
        assert_relative_eq!(part.bounds.width, 10.0, epsilon = 1e-10);
    }

    #[test]
    fn test_rotated_part_keeps_area() {
        let part = Part::new(0, square(10.0), Vec::new());
        let rotated = part.rotated(45.0);
        assert_relative_eq!(rotated.area, 100.0, epsilon = 1e-10);
        // 45-degree square has a sqrt(2) wider bounding box.
        assert_relative_eq!(rotated.bounds.width, 10.0 * 2f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_container() {
        let c = Container::new(Vec::new(), Vec::new(), 100.0);
        assert!(c.is_degenerate());
        assert_relative_eq!(c.gross_area, 100.0);
    }
}
