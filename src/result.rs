//! Result types for a nesting run.

use serde::{Deserialize, Serialize};

/// Final pose of one placed part: rotate by `rotation` degrees around the
/// origin, then translate by `(dx, dy)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub part_id: i64,
    pub dx: f64,
    pub dy: f64,
    /// Rotation in degrees.
    pub rotation: f64,
}

/// One evaluated layout: what a placement worker returns for a single
/// individual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessRecord {
    /// Poses of the parts that fit, in placement order.
    pub placements: Vec<Placement>,
    /// IDs of the parts that did not fit.
    pub unplaced: Vec<i64>,
    /// Scalar score, lower is better: twice the bounding width of the layout
    /// plus the summed area of unplaced parts.
    pub fitness: f64,
    /// Total area of the placed parts.
    pub area: f64,
    /// Width of the axis-aligned bounding box over all placed parts.
    pub bounds_width: f64,
}

impl FitnessRecord {
    /// A record with nothing placed, penalised by the full unplaced area.
    pub fn empty(unplaced: Vec<i64>, unplaced_area: f64) -> Self {
        Self {
            placements: Vec::new(),
            unplaced,
            fitness: unplaced_area,
            area: 0.0,
            bounds_width: 0.0,
        }
    }

    pub fn placed_count(&self) -> usize {
        self.placements.len()
    }
}

/// Per-generation progress snapshot handed to the progress callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: u32,
    pub best_fitness: f64,
    pub avg_fitness: f64,
    /// Placed count of the best layout so far.
    pub best_placed: usize,
    pub total_parts: usize,
    /// Placed area of the best layout over the container area.
    pub utilization: f64,
}

/// Outcome of a nesting run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestResult {
    /// Best layout found across all generations.
    pub placements: Vec<Placement>,
    /// IDs of parts absent from the best layout.
    pub unplaced: Vec<i64>,
    pub fitness: f64,
    /// Placed area over container area, in `[0, 1]`.
    pub utilization: f64,
    /// Generations actually executed.
    pub generations: u32,
    /// Best fitness after each generation.
    pub fitness_history: Vec<f64>,
    /// True when the run stopped on the cooperative cancel signal.
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl NestResult {
    pub fn placed_count(&self) -> usize {
        self.placements.len()
    }

    pub fn total_parts(&self) -> usize {
        self.placements.len() + self.unplaced.len()
    }

    pub fn all_placed(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn utilization_percent(&self) -> String {
        format!("{:.1}%", self.utilization * 100.0)
    }
}
