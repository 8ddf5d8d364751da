//! Nesting orchestrator.
//!
//! Owns the configuration, the validated container and parts, and the NFP
//! cache. `run` drives the genetic algorithm: each generation the population
//! is evaluated by placement workers in parallel, the best record is folded
//! into the best-so-far, and evolution continues until the generation budget
//! or the stagnation limit is hit. All randomness sits in the GA's seeded
//! RNG, so results are reproducible for a fixed seed regardless of the
//! evaluation parallelism.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::cache::NfpCache;
use crate::clipper;
use crate::config::NestConfig;
use crate::error::{Error, Result};
use crate::ga::GeneticAlgorithm;
use crate::geometry::{self, Point, EPS};
use crate::part::{Container, Part};
use crate::placement::PlacementWorker;
use crate::result::{FitnessRecord, GenerationStats, NestResult};

/// Coordinates a whole nesting job.
pub struct Nester {
    config: NestConfig,
    container: Option<Container>,
    parts: Vec<Part>,
    cache: NfpCache,
    cancelled: Arc<AtomicBool>,
}

impl Nester {
    pub fn new(config: NestConfig) -> Self {
        Self {
            config: config.sanitized(),
            container: None,
            parts: Vec::new(),
            cache: NfpCache::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &NestConfig {
        &self.config
    }

    /// Registers the container outline.
    pub fn add_container(&mut self, points: &[Point]) -> Result<()> {
        self.add_container_with_holes(points, &[])
    }

    /// Registers the container outline together with hole loops. Holes are
    /// kept in the container's coordinate frame and parts never overlap
    /// them.
    pub fn add_container_with_holes(
        &mut self,
        points: &[Point],
        holes: &[Vec<Point>],
    ) -> Result<()> {
        let outline = self.validated_outline(points, "container")?;
        for hole in holes {
            self.validated_outline(hole, "container hole")?;
        }

        let offset = geometry::bounds(&outline);
        let normalized = geometry::ensure_ccw(&geometry::translate_polygon(
            &outline, -offset.x, -offset.y,
        ));
        let gross_area = geometry::area(&normalized);
        let mut moved_holes: Vec<Vec<Point>> = holes
            .iter()
            .map(|h| {
                geometry::ensure_ccw(&geometry::translate_polygon(h, -offset.x, -offset.y))
            })
            .collect();

        let half = self.config.spacing / 2.0;
        let working = if half > 0.0 {
            match clipper::offset_polygon(&normalized, -half) {
                Ok(poly) => poly,
                Err(err) => {
                    log::warn!("container collapsed under spacing offset: {err}");
                    Vec::new()
                }
            }
        } else {
            normalized
        };
        if half > 0.0 {
            for hole in moved_holes.iter_mut() {
                match clipper::offset_polygon(hole, half) {
                    Ok(grown) => *hole = grown,
                    Err(err) => log::warn!("container hole kept unoffset: {err}"),
                }
            }
        }

        self.container = Some(Container::new(working, moved_holes, gross_area));
        Ok(())
    }

    /// Registers a part, returning its stable ID.
    pub fn add_part(&mut self, points: &[Point]) -> Result<i64> {
        self.add_part_with_holes(points, &[])
    }

    /// Registers a part with hole loops. Holes only matter for placement
    /// when `use_holes` is enabled.
    pub fn add_part_with_holes(&mut self, points: &[Point], holes: &[Vec<Point>]) -> Result<i64> {
        let outline = self.validated_outline(points, "part")?;
        for hole in holes {
            self.validated_outline(hole, "part hole")?;
        }

        let offset = geometry::bounds(&outline);
        let normalized = geometry::ensure_ccw(&geometry::translate_polygon(
            &outline, -offset.x, -offset.y,
        ));
        let mut moved_holes: Vec<Vec<Point>> = holes
            .iter()
            .map(|h| {
                geometry::ensure_ccw(&geometry::translate_polygon(h, -offset.x, -offset.y))
            })
            .collect();

        let half = self.config.spacing / 2.0;
        let working = if half > 0.0 {
            clipper::offset_polygon(&normalized, half)?
        } else {
            normalized
        };
        if half > 0.0 {
            // Cavities shrink with spacing; ones that collapse can no longer
            // host anything.
            moved_holes.retain_mut(|hole| match clipper::offset_polygon(hole, -half) {
                Ok(shrunk) => {
                    *hole = shrunk;
                    true
                }
                Err(_) => false,
            });
        }

        let id = self.parts.len() as i64;
        self.parts.push(Part::new(id, working, moved_holes));
        Ok(id)
    }

    /// Registers several parts at once.
    pub fn add_parts(&mut self, parts: &[Vec<Point>]) -> Result<Vec<i64>> {
        parts.iter().map(|p| self.add_part(p)).collect()
    }

    /// Drops all parts, the container, cached NFPs and any cancel request.
    pub fn clear(&mut self) {
        self.parts.clear();
        self.container = None;
        self.cache.clear();
        self.cancelled.store(false, Ordering::Relaxed);
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Handle for cooperative cancellation; checked between generations and
    /// between part placements.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Runs the nesting job to completion.
    pub fn run(&mut self) -> Result<NestResult> {
        self.run_with_progress(|_| {})
    }

    /// Runs the nesting job, invoking `progress` once per generation.
    pub fn run_with_progress<F>(&mut self, mut progress: F) -> Result<NestResult>
    where
        F: FnMut(&GenerationStats),
    {
        let container = self
            .container
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("no container defined".into()))?;
        if self.parts.is_empty() {
            return Err(Error::InvalidInput("no parts to nest".into()));
        }
        self.cancelled.store(false, Ordering::Relaxed);

        let start = Instant::now();

        // Largest-first ordering gives the seed individual its greedy bias.
        let mut parts = self.parts.clone();
        parts.sort_by(|a, b| b.area.total_cmp(&a.area).then(a.id.cmp(&b.id)));
        let total_area: f64 = parts.iter().map(|p| p.area).sum();

        if container.is_degenerate() {
            log::warn!("container is unusable after spacing offset; nothing can be placed");
        }

        let mut ga = GeneticAlgorithm::new(parts.len(), &self.config);
        let mut best: Option<FitnessRecord> = None;
        let mut history: Vec<f64> = Vec::new();
        let mut stagnation = 0u32;
        let mut generations_run = 0u32;
        let stagnation_limit = self.config.stagnation_limit();

        for generation in 0..self.config.max_generations {
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }
            generations_run = generation + 1;

            let worker = PlacementWorker::new(container, &parts, &self.cache, &self.config);
            let cancel_flag: &AtomicBool = &self.cancelled;
            let records: Vec<FitnessRecord> = ga
                .population()
                .par_iter()
                .map(|individual| worker.place(individual, cancel_flag))
                .collect();

            // Generation best with a stable (fitness, index) tie-break.
            let mut best_idx = 0;
            for (i, record) in records.iter().enumerate() {
                if record.fitness < records[best_idx].fitness {
                    best_idx = i;
                }
            }

            let improved = match &best {
                None => true,
                Some(record) => records[best_idx].fitness < record.fitness,
            };
            if improved {
                best = Some(records[best_idx].clone());
                stagnation = 0;
            } else {
                stagnation += 1;
            }

            if let Some(record) = &best {
                history.push(record.fitness);
                let avg_fitness =
                    records.iter().map(|r| r.fitness).sum::<f64>() / records.len() as f64;
                let stats = GenerationStats {
                    generation,
                    best_fitness: record.fitness,
                    avg_fitness,
                    best_placed: record.placed_count(),
                    total_parts: parts.len(),
                    utilization: self.utilization_of(record),
                };
                log::debug!(
                    "generation {}: best fitness {:.3}, placed {}/{}, avg {:.3}",
                    stats.generation,
                    stats.best_fitness,
                    stats.best_placed,
                    stats.total_parts,
                    stats.avg_fitness
                );
                progress(&stats);
            }

            if stagnation >= stagnation_limit {
                log::debug!("stopping after {stagnation} stagnant generations");
                break;
            }

            if generation + 1 < self.config.max_generations
                && !self.cancelled.load(Ordering::Relaxed)
            {
                let fitnesses: Vec<f64> = records.iter().map(|r| r.fitness).collect();
                ga.set_fitnesses(&fitnesses);
                ga.sort_by_fitness();
                ga.evolve();
            }
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let cancelled = self.cancelled.load(Ordering::Relaxed);

        Ok(match best {
            Some(record) => NestResult {
                utilization: self.utilization_of(&record),
                placements: record.placements,
                unplaced: record.unplaced,
                fitness: record.fitness,
                generations: generations_run,
                fitness_history: history,
                cancelled,
                elapsed_ms,
            },
            // Cancelled before the first generation finished.
            None => NestResult {
                placements: Vec::new(),
                unplaced: parts.iter().map(|p| p.id).collect(),
                fitness: total_area,
                utilization: 0.0,
                generations: generations_run,
                fitness_history: history,
                cancelled,
                elapsed_ms,
            },
        })
    }

    /// World outlines of the placed parts of a result, for visualisation.
    pub fn placement_outlines(&self, result: &NestResult) -> Vec<(i64, Vec<Point>)> {
        result
            .placements
            .iter()
            .filter_map(|p| {
                let part = self.parts.iter().find(|part| part.id == p.part_id)?;
                let rotated = geometry::rotate_polygon(&part.polygon, p.rotation);
                Some((
                    p.part_id,
                    geometry::translate_polygon(&rotated, p.dx, p.dy),
                ))
            })
            .collect()
    }

    fn utilization_of(&self, record: &FitnessRecord) -> f64 {
        match &self.container {
            Some(c) if c.gross_area > 0.0 => (record.area / c.gross_area).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    /// Input validation shared by containers and parts: enough vertices,
    /// finite coordinates, a simple outline, and non-zero area. Vertices
    /// closer than the curve tolerance are merged first.
    fn validated_outline(&self, points: &[Point], what: &str) -> Result<Vec<Point>> {
        if points.len() < 3 {
            return Err(Error::InvalidInput(format!(
                "{what} needs at least 3 vertices, got {}",
                points.len()
            )));
        }
        if let Some(bad) = points.iter().find(|p| !p.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "{what} has a non-finite coordinate ({}, {})",
                bad.x, bad.y
            )));
        }
        let cleaned = geometry::dedupe_polygon(points, self.config.curve_tolerance.max(EPS));
        if cleaned.len() < 3 || geometry::area(&cleaned) < EPS {
            return Err(Error::InvalidInput(format!("{what} has no area")));
        }
        if geometry::is_self_intersecting(&cleaned) {
            return Err(Error::InvalidInput(format!("{what} is self-intersecting")));
        }
        Ok(cleaned)
    }
}

impl Default for Nester {
    fn default() -> Self {
        Self::new(NestConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(w: f64) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, w),
            Point::new(0.0, w),
        ]
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut nester = Nester::default();

        let two = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)];
        assert!(nester.add_part(&two).is_err());

        let nan = vec![
            Point::new(0.0, 0.0),
            Point::new(f64::NAN, 0.0),
            Point::new(1.0, 1.0),
        ];
        assert!(nester.add_part(&nan).is_err());

        let bowtie: Vec<Point> = [(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0)]
            .iter()
            .map(|&p| Point::from(p))
            .collect();
        assert!(nester.add_part(&bowtie).is_err());
    }

    #[test]
    fn test_run_requires_container_and_parts() {
        let mut nester = Nester::default();
        assert!(nester.run().is_err());

        nester.add_container(&square(100.0)).unwrap();
        assert!(nester.run().is_err());
    }

    #[test]
    fn test_parts_get_sequential_ids() {
        let mut nester = Nester::default();
        let a = nester.add_part(&square(10.0)).unwrap();
        let b = nester.add_part(&square(20.0)).unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(nester.part_count(), 2);

        nester.clear();
        assert_eq!(nester.part_count(), 0);
    }

    #[test]
    fn test_spacing_offsets_applied_on_add() {
        let mut nester = Nester::new(NestConfig::default().with_spacing(5.0));
        nester.add_container(&square(100.0)).unwrap();
        nester.add_part(&square(40.0)).unwrap();

        let container = nester.container.as_ref().unwrap();
        assert!((geometry::area(&container.polygon) - 95.0 * 95.0).abs() < 1e-3);
        // Utilization still uses the gross area.
        assert!((container.gross_area - 10_000.0).abs() < 1e-9);

        let part = &nester.parts[0];
        assert!((part.bounds.width - 45.0).abs() < 1e-6);
    }

    #[test]
    fn test_container_normalised_to_origin() {
        let mut nester = Nester::default();
        let shifted = geometry::translate_polygon(&square(50.0), 30.0, 40.0);
        nester.add_container(&shifted).unwrap();

        let container = nester.container.as_ref().unwrap();
        assert!((container.bounds.x).abs() < 1e-9);
        assert!((container.bounds.y).abs() < 1e-9);
    }

    #[test]
    fn test_placement_outlines_world_coordinates() {
        let mut nester = Nester::new(
            NestConfig::default()
                .with_seed(1)
                .with_rotations(1)
                .with_population_size(2)
                .with_max_generations(1),
        );
        nester.add_container(&square(100.0)).unwrap();
        nester.add_part(&square(10.0)).unwrap();

        let result = nester.run().unwrap();
        let outlines = nester.placement_outlines(&result);
        assert_eq!(outlines.len(), 1);
        let b = geometry::bounds(&outlines[0].1);
        assert!((b.width - 10.0).abs() < 1e-9);
    }
}
