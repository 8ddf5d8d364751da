//! Greedy NFP-guided placement.
//!
//! A worker evaluates one individual: it walks the permutation, and for each
//! rotated part intersects the feasible region (inner NFP of the container)
//! with the complement of every placed part's translated outer NFP. Candidate
//! reference points are the vertices of that remainder: loop vertices plus
//! pairwise boundary intersections, filtered by region membership. Candidates
//! are ranked by the resulting layout bounding width (ties by x, then y) and
//! the first one that survives an exact polygon-overlap check wins.
//!
//! For the same individual and container the worker is deterministic: all
//! candidate ordering uses total comparisons on grid-snapped coordinates.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::{NfpCache, NfpKey};
use crate::config::NestConfig;
use crate::ga::Individual;
use crate::geometry::{self, Bounds, Point};
use crate::nfp::{self, Nfp, NfpOutcome, Region};
use crate::part::{Container, Part, RotatedPart, CONTAINER_ID};
use crate::result::{FitnessRecord, Placement};

/// Grid used to snap candidate coordinates before comparisons.
const SNAP_SCALE: f64 = 1e7;

/// Evaluates individuals against one container and part set.
///
/// Borrows everything read-only; the NFP cache is the only shared state and
/// is safe to use from many workers at once.
pub struct PlacementWorker<'a> {
    container: &'a Container,
    parts: &'a [Part],
    cache: &'a NfpCache,
    config: &'a NestConfig,
}

/// A part that has been committed to the layout.
struct PlacedPart {
    rotated: RotatedPart,
    translation: Point,
    world: Vec<Point>,
    world_holes: Vec<Vec<Point>>,
}

impl<'a> PlacementWorker<'a> {
    pub fn new(
        container: &'a Container,
        parts: &'a [Part],
        cache: &'a NfpCache,
        config: &'a NestConfig,
    ) -> Self {
        Self {
            container,
            parts,
            cache,
            config,
        }
    }

    /// Places the individual's parts in order and scores the layout.
    ///
    /// Fitness is `2 * bounding_width + sum(area of unplaced parts)`, lower
    /// is better. Parts whose NFP queries fail are recorded as unplaced; on
    /// cancellation the remaining parts are enumerated as unplaced and the
    /// partial layout is scored.
    pub fn place(&self, individual: &Individual, cancelled: &AtomicBool) -> FitnessRecord {
        let mut placed: Vec<PlacedPart> = Vec::new();
        let mut placements: Vec<Placement> = Vec::new();
        let mut unplaced: Vec<i64> = Vec::new();
        let mut unplaced_area = 0.0;
        let mut placed_area = 0.0;
        let mut layout: Option<Bounds> = None;

        for (slot, &part_idx) in individual.order.iter().enumerate() {
            let part = &self.parts[part_idx];
            if cancelled.load(Ordering::Relaxed) {
                unplaced.push(part.id);
                unplaced_area += part.area;
                continue;
            }

            let rotation = individual.rotations.get(slot).copied().unwrap_or(0.0);
            let rotated = part.rotated(rotation);

            match self.find_position(&rotated, &placed, layout.as_ref()) {
                Some(t) => {
                    let world = geometry::translate_polygon(&rotated.polygon, t.x, t.y);
                    let world_holes = rotated
                        .holes
                        .iter()
                        .map(|h| geometry::translate_polygon(h, t.x, t.y))
                        .collect();
                    let bounds = rotated.bounds.translated(t.x, t.y);
                    layout = Some(match layout {
                        Some(lb) => lb.merged(&bounds),
                        None => bounds,
                    });
                    placed_area += rotated.area;
                    placements.push(Placement {
                        part_id: part.id,
                        dx: t.x,
                        dy: t.y,
                        rotation,
                    });
                    placed.push(PlacedPart {
                        rotated,
                        translation: t,
                        world,
                        world_holes,
                    });
                }
                None => {
                    unplaced.push(part.id);
                    unplaced_area += part.area;
                }
            }
        }

        let width = layout.map_or(0.0, |b| b.width);
        FitnessRecord {
            placements,
            unplaced,
            fitness: 2.0 * width + unplaced_area,
            area: placed_area,
            bounds_width: width,
        }
    }

    /// Best feasible reference point for the rotated part, or `None` when it
    /// cannot be placed.
    fn find_position(
        &self,
        part: &RotatedPart,
        placed: &[PlacedPart],
        layout: Option<&Bounds>,
    ) -> Option<Point> {
        let inner = self.cache.get_or_compute(
            NfpKey::new(CONTAINER_ID, part.part_id, 0.0, part.rotation, true),
            || nfp::inner_nfp(&self.container.polygon, &self.container.holes, &part.polygon),
        );
        let inner_nfp = inner.nfp()?;

        // Forbidden regions: every placed part's outer NFP, translated into
        // place. A failed NFP makes the pair non-placeable.
        let mut forbidden: Vec<(usize, Region)> = Vec::new();
        for (qi, q) in placed.iter().enumerate() {
            let outcome = self.cache.get_or_compute(
                NfpKey::new(
                    q.rotated.part_id,
                    part.part_id,
                    q.rotated.rotation,
                    part.rotation,
                    false,
                ),
                || {
                    nfp::outer_nfp(
                        &q.rotated.polygon,
                        &part.polygon,
                        self.config.explore_concave,
                    )
                },
            );
            match outcome.nfp() {
                Some(nfp) => {
                    for region in &nfp.regions {
                        forbidden.push((qi, region.translated(q.translation.x, q.translation.y)));
                    }
                }
                None => return None,
            }
        }

        // Extra feasible regions inside holes of placed parts.
        let hosted = if self.config.use_holes {
            self.hole_regions(part, placed)
        } else {
            Vec::new()
        };

        let candidates = self.candidate_points(inner_nfp, &forbidden, &hosted);

        let mut ranked: Vec<(f64, Point)> = Vec::with_capacity(candidates.len());
        for c in candidates {
            let host = hosted
                .iter()
                .find(|(_, r)| r.contains(c))
                .map(|(qi, _)| *qi);
            let in_sheet = inner_nfp.regions.iter().any(|r| r.contains(c));
            if !in_sheet && host.is_none() {
                continue;
            }
            if forbidden
                .iter()
                .any(|(qi, r)| Some(*qi) != host && r.forbids(c))
            {
                continue;
            }
            let bounds = part.bounds.translated(c.x, c.y);
            let width = match layout {
                Some(lb) => lb.merged(&bounds).width,
                None => bounds.width,
            };
            ranked.push((width, c));
        }

        ranked.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(a.1.x.total_cmp(&b.1.x))
                .then(a.1.y.total_cmp(&b.1.y))
        });

        ranked
            .into_iter()
            .map(|(_, c)| c)
            .find(|&c| self.verify(part, c, placed))
    }

    /// Inner NFPs of the part against each hole of each placed part,
    /// translated into place. Only consulted when `use_holes` is on.
    fn hole_regions(&self, part: &RotatedPart, placed: &[PlacedPart]) -> Vec<(usize, Region)> {
        let mut hosted = Vec::new();
        for (qi, q) in placed.iter().enumerate() {
            if q.rotated.holes.is_empty() {
                continue;
            }
            let outcome = self.cache.get_or_compute(
                NfpKey::new(
                    q.rotated.part_id,
                    part.part_id,
                    q.rotated.rotation,
                    part.rotation,
                    true,
                ),
                || {
                    let mut regions = Vec::new();
                    for hole in &q.rotated.holes {
                        if let NfpOutcome::Fit(nfp) = nfp::inner_nfp(hole, &[], &part.polygon) {
                            regions.extend(nfp.regions);
                        }
                    }
                    if regions.is_empty() {
                        NfpOutcome::NoFit
                    } else {
                        NfpOutcome::Fit(Nfp { regions })
                    }
                },
            );
            if let Some(nfp) = outcome.nfp() {
                for region in &nfp.regions {
                    hosted.push((qi, region.translated(q.translation.x, q.translation.y)));
                }
            }
        }
        hosted
    }

    /// Vertices of the feasible remainder: all loop vertices plus pairwise
    /// boundary intersection points, snapped and deduplicated.
    fn candidate_points(
        &self,
        inner: &Nfp,
        forbidden: &[(usize, Region)],
        hosted: &[(usize, Region)],
    ) -> Vec<Point> {
        let mut loops: Vec<&Vec<Point>> = Vec::new();
        for region in &inner.regions {
            loops.extend(region.loops());
        }
        for (_, region) in forbidden {
            loops.extend(region.loops());
        }
        for (_, region) in hosted {
            loops.extend(region.loops());
        }

        let mut candidates: Vec<Point> = Vec::new();
        for loop_ in &loops {
            candidates.extend(loop_.iter().copied());
        }
        for i in 0..loops.len() {
            for j in (i + 1)..loops.len() {
                let la = loops[i];
                let lb = loops[j];
                for ei in 0..la.len() {
                    let a1 = la[ei];
                    let a2 = la[(ei + 1) % la.len()];
                    for ej in 0..lb.len() {
                        if let Some(p) = geometry::segment_intersection(
                            a1,
                            a2,
                            lb[ej],
                            lb[(ej + 1) % lb.len()],
                        ) {
                            candidates.push(p);
                        }
                    }
                }
            }
        }

        for c in candidates.iter_mut() {
            *c = Point::new(snap(c.x), snap(c.y));
        }
        candidates.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        candidates.dedup_by(|a, b| a.almost_equal(*b, geometry::EPS));
        candidates
    }

    /// Exact feasibility check for a candidate: containment in the sheet and
    /// zero interior overlap with every placed part. A part fully inside a
    /// hole of a placed part is exempt from overlapping its host when
    /// `use_holes` is enabled.
    fn verify(&self, part: &RotatedPart, t: Point, placed: &[PlacedPart]) -> bool {
        if self.container.is_degenerate() {
            return false;
        }
        let world = geometry::translate_polygon(&part.polygon, t.x, t.y);

        if !geometry::polygon_inside(&world, &self.container.polygon) {
            return false;
        }
        if self
            .container
            .holes
            .iter()
            .any(|h| geometry::polygons_overlap(&world, h))
        {
            return false;
        }

        let host = if self.config.use_holes {
            placed.iter().position(|q| {
                q.world_holes
                    .iter()
                    .any(|h| geometry::polygon_inside(&world, h))
            })
        } else {
            None
        };

        for (qi, q) in placed.iter().enumerate() {
            if Some(qi) == host {
                continue;
            }
            if geometry::polygons_overlap(&world, &q.world) {
                return false;
            }
        }
        true
    }
}

#[inline]
fn snap(v: f64) -> f64 {
    (v * SNAP_SCALE).round() / SNAP_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NfpCache;
    use crate::config::NestConfig;
    use crate::ga::Individual;
    use approx::assert_relative_eq;
    use std::sync::atomic::AtomicBool;

    fn square(w: f64) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, w),
            Point::new(0.0, w),
        ]
    }

    fn container(w: f64, h: f64) -> Container {
        let polygon = vec![
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ];
        let gross = geometry::area(&polygon);
        Container::new(polygon, Vec::new(), gross)
    }

    fn identity_individual(n: usize) -> Individual {
        Individual::seeded(n)
    }

    #[test]
    fn test_single_square_lands_at_origin() {
        let container = container(100.0, 100.0);
        let parts = vec![Part::new(0, square(10.0), Vec::new())];
        let cache = NfpCache::new();
        let config = NestConfig::default();
        let worker = PlacementWorker::new(&container, &parts, &cache, &config);

        let record = worker.place(&identity_individual(1), &AtomicBool::new(false));

        assert_eq!(record.placed_count(), 1);
        assert!(record.unplaced.is_empty());
        assert_relative_eq!(record.placements[0].dx, 0.0, epsilon = 1e-9);
        assert_relative_eq!(record.placements[0].dy, 0.0, epsilon = 1e-9);
        assert_relative_eq!(record.bounds_width, 10.0, epsilon = 1e-9);
        assert_relative_eq!(record.fitness, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_two_squares_min_width_stacks() {
        // Minimising bounding width stacks the second square on top of the
        // first instead of widening the layout.
        let container = container(100.0, 100.0);
        let parts = vec![
            Part::new(0, square(50.0), Vec::new()),
            Part::new(1, square(50.0), Vec::new()),
        ];
        let cache = NfpCache::new();
        let config = NestConfig::default();
        let worker = PlacementWorker::new(&container, &parts, &cache, &config);

        let record = worker.place(&identity_individual(2), &AtomicBool::new(false));

        assert_eq!(record.placed_count(), 2);
        assert_relative_eq!(record.bounds_width, 50.0, epsilon = 1e-6);
        assert_relative_eq!(record.placements[0].dx, 0.0, epsilon = 1e-9);
        assert_relative_eq!(record.placements[0].dy, 0.0, epsilon = 1e-9);
        assert_relative_eq!(record.placements[1].dx, 0.0, epsilon = 1e-6);
        assert_relative_eq!(record.placements[1].dy, 50.0, epsilon = 1e-6);
    }

    #[test]
    fn test_oversize_part_unplaced_with_area_penalty() {
        let container = container(100.0, 100.0);
        let parts = vec![Part::new(0, square(200.0), Vec::new())];
        let cache = NfpCache::new();
        let config = NestConfig::default();
        let worker = PlacementWorker::new(&container, &parts, &cache, &config);

        let record = worker.place(&identity_individual(1), &AtomicBool::new(false));

        assert_eq!(record.placed_count(), 0);
        assert_eq!(record.unplaced, vec![0]);
        assert_relative_eq!(record.fitness, 40_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_three_squares_no_overlap() {
        let container = container(100.0, 100.0);
        let parts = (0..3)
            .map(|i| Part::new(i, square(40.0), Vec::new()))
            .collect::<Vec<_>>();
        let cache = NfpCache::new();
        let config = NestConfig::default();
        let worker = PlacementWorker::new(&container, &parts, &cache, &config);

        let record = worker.place(&identity_individual(3), &AtomicBool::new(false));
        assert_eq!(record.placed_count(), 3);

        let worlds: Vec<Vec<Point>> = record
            .placements
            .iter()
            .map(|p| {
                let rotated = parts[p.part_id as usize].rotated(p.rotation);
                geometry::translate_polygon(&rotated.polygon, p.dx, p.dy)
            })
            .collect();
        for i in 0..worlds.len() {
            assert!(geometry::polygon_inside(&worlds[i], &container.polygon));
            for j in (i + 1)..worlds.len() {
                assert!(
                    !geometry::polygons_overlap(&worlds[i], &worlds[j]),
                    "parts {i} and {j} overlap"
                );
            }
        }
    }

    #[test]
    fn test_degenerate_container_places_nothing() {
        let degenerate = Container::new(Vec::new(), Vec::new(), 10_000.0);
        let parts = vec![Part::new(0, square(10.0), Vec::new())];
        let cache = NfpCache::new();
        let config = NestConfig::default();
        let worker = PlacementWorker::new(&degenerate, &parts, &cache, &config);

        let record = worker.place(&identity_individual(1), &AtomicBool::new(false));
        assert_eq!(record.placed_count(), 0);
        assert_relative_eq!(record.fitness, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cancelled_worker_reports_unplaced() {
        let container = container(100.0, 100.0);
        let parts = vec![
            Part::new(0, square(10.0), Vec::new()),
            Part::new(1, square(10.0), Vec::new()),
        ];
        let cache = NfpCache::new();
        let config = NestConfig::default();
        let worker = PlacementWorker::new(&container, &parts, &cache, &config);

        let record = worker.place(&identity_individual(2), &AtomicBool::new(true));
        assert_eq!(record.placed_count(), 0);
        assert_eq!(record.unplaced.len(), 2);
    }

    #[test]
    fn test_part_in_hole_requires_use_holes() {
        // A frame filling the whole container leaves its hole as the only
        // conceivable spot for the small square, which is reachable only
        // when use_holes is enabled.
        let container = container(40.0, 40.0);
        let hole = geometry::translate_polygon(&square(20.0), 10.0, 10.0);
        let frame = Part::new(0, square(40.0), vec![hole]);
        let small = Part::new(1, square(10.0), Vec::new());
        let parts = vec![frame, small];

        let off = NestConfig::default();
        let cache = NfpCache::new();
        let worker = PlacementWorker::new(&container, &parts, &cache, &off);
        let record = worker.place(&identity_individual(2), &AtomicBool::new(false));
        assert_eq!(record.placed_count(), 1);
        assert_eq!(record.unplaced, vec![1]);

        let on = NestConfig::default().with_use_holes(true);
        let cache2 = NfpCache::new();
        let worker2 = PlacementWorker::new(&container, &parts, &cache2, &on);
        let record2 = worker2.place(&identity_individual(2), &AtomicBool::new(false));
        assert_eq!(record2.placed_count(), 2);

        let small_placement = record2
            .placements
            .iter()
            .find(|p| p.part_id == 1)
            .expect("small part placed");
        let world =
            geometry::translate_polygon(&parts[1].polygon, small_placement.dx, small_placement.dy);
        let hole_world = geometry::translate_polygon(
            &parts[0].holes[0],
            record2.placements[0].dx,
            record2.placements[0].dy,
        );
        assert!(
            geometry::polygon_inside(&world, &hole_world),
            "small part should nest inside the frame hole"
        );
    }
}
