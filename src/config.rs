//! Nesting configuration.

use serde::{Deserialize, Serialize};

/// Typed configuration for a nesting run.
///
/// Unknown options cannot exist by construction; out-of-range values are
/// clamped by the builder methods and by [`NestConfig::sanitized`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NestConfig {
    /// Maximum chord error allowed when the ingest layer flattens curves.
    /// Consumed at the boundary; carried here so vertex deduplication uses
    /// the same tolerance.
    pub curve_tolerance: f64,

    /// Mandatory clearance between any two placed parts and between a part
    /// and the container. Realised by offsetting parts outward and the
    /// container inward by half this value.
    pub spacing: f64,

    /// Size of the allowed-rotation set per part: angles `k * 360 / rotations`
    /// degrees for `k in 0..rotations`.
    pub rotations: u32,

    /// Genetic algorithm population size, at least 2.
    pub population_size: usize,

    /// Per-gene mutation percentage, clamped to `[1, 50]`.
    pub mutation_rate: u32,

    /// Hard upper bound on generations.
    pub max_generations: u32,

    /// Seed additional sliding orbits from concave pockets when computing
    /// outer NFPs of non-convex pairs.
    pub explore_concave: bool,

    /// Allow parts to be placed inside holes of already-placed parts.
    /// Experimental; off by default.
    pub use_holes: bool,

    /// Seed for the deterministic PRNG. Same seed and same inputs produce
    /// the same result.
    pub seed: u64,
}

impl Default for NestConfig {
    fn default() -> Self {
        Self {
            curve_tolerance: 0.3,
            spacing: 0.0,
            rotations: 4,
            population_size: 10,
            mutation_rate: 10,
            max_generations: 100,
            explore_concave: false,
            use_holes: false,
            seed: 0,
        }
    }
}

impl NestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing.max(0.0);
        self
    }

    pub fn with_rotations(mut self, rotations: u32) -> Self {
        self.rotations = rotations.max(1);
        self
    }

    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size.max(2);
        self
    }

    pub fn with_mutation_rate(mut self, percent: u32) -> Self {
        self.mutation_rate = percent.clamp(1, 50);
        self
    }

    pub fn with_max_generations(mut self, generations: u32) -> Self {
        self.max_generations = generations;
        self
    }

    pub fn with_explore_concave(mut self, enabled: bool) -> Self {
        self.explore_concave = enabled;
        self
    }

    pub fn with_use_holes(mut self, enabled: bool) -> Self {
        self.use_holes = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_curve_tolerance(mut self, tolerance: f64) -> Self {
        self.curve_tolerance = tolerance.max(0.0);
        self
    }

    /// Returns a copy with every field forced into its valid range. Applied
    /// once when the orchestrator takes ownership of the configuration, so
    /// deserialized configs get the same treatment as built ones.
    pub fn sanitized(&self) -> Self {
        let mut c = self.clone();
        c.rotations = c.rotations.max(1);
        c.population_size = c.population_size.max(2);
        c.mutation_rate = c.mutation_rate.clamp(1, 50);
        c.spacing = c.spacing.max(0.0);
        c.curve_tolerance = c.curve_tolerance.max(0.0);
        c
    }

    /// The allowed rotation set, in degrees.
    pub fn allowed_rotations(&self) -> Vec<f64> {
        let n = self.rotations.max(1);
        (0..n).map(|k| k as f64 * 360.0 / n as f64).collect()
    }

    /// Generations without improvement after which the GA stops early.
    pub fn stagnation_limit(&self) -> u32 {
        (self.max_generations / 5).max(20)
    }

    /// Per-gene mutation probability in `[0, 1]`.
    pub fn mutation_probability(&self) -> f64 {
        f64::from(self.mutation_rate.clamp(1, 50)) / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = NestConfig::default();
        assert_eq!(c.rotations, 4);
        assert_eq!(c.population_size, 10);
        assert_eq!(c.mutation_rate, 10);
        assert_eq!(c.max_generations, 100);
        assert!(!c.explore_concave);
        assert!(!c.use_holes);
    }

    #[test]
    fn test_builder_clamps() {
        let c = NestConfig::new()
            .with_population_size(0)
            .with_mutation_rate(95)
            .with_rotations(0);
        assert_eq!(c.population_size, 2);
        assert_eq!(c.mutation_rate, 50);
        assert_eq!(c.rotations, 1);
    }

    #[test]
    fn test_allowed_rotations() {
        let c = NestConfig::new().with_rotations(4);
        let angles = c.allowed_rotations();
        assert_eq!(angles, vec![0.0, 90.0, 180.0, 270.0]);

        let single = NestConfig::new().with_rotations(1);
        assert_eq!(single.allowed_rotations(), vec![0.0]);
    }

    #[test]
    fn test_stagnation_limit() {
        assert_eq!(NestConfig::new().with_max_generations(100).stagnation_limit(), 20);
        assert_eq!(NestConfig::new().with_max_generations(500).stagnation_limit(), 100);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let json = r#"{ "spacing": 1.0, "laser_power": 9000 }"#;
        let parsed: Result<NestConfig, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }
}
