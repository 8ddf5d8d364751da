//! Genetic algorithm over placement order and rotations.
//!
//! An individual is a permutation of part indices plus one rotation angle per
//! permutation slot. Evaluation happens outside this module (the orchestrator
//! runs placement workers, possibly in parallel) and writes fitness back;
//! everything random lives here, driven by a single seeded `StdRng`, so a
//! fixed seed reproduces the whole evolution regardless of evaluation
//! parallelism.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::NestConfig;

/// One candidate solution.
#[derive(Debug, Clone)]
pub struct Individual {
    /// Order in which parts are attempted, as indices into the sorted part
    /// list.
    pub order: Vec<usize>,
    /// Rotation in degrees per permutation slot.
    pub rotations: Vec<f64>,
    /// Fitness assigned by the last evaluation, lower is better.
    pub fitness: Option<f64>,
}

impl Individual {
    /// The deterministic seed individual: identity order, zero rotations.
    pub fn seeded(part_count: usize) -> Self {
        Self {
            order: (0..part_count).collect(),
            rotations: vec![0.0; part_count],
            fitness: None,
        }
    }

    fn fitness_or_worst(&self) -> f64 {
        self.fitness.unwrap_or(f64::INFINITY)
    }
}

/// Probability that a tournament picks the better of its two contestants.
const TOURNAMENT_BIAS: f64 = 0.75;

/// Evolution state for one nesting run.
pub struct GeneticAlgorithm {
    population: Vec<Individual>,
    allowed_rotations: Vec<f64>,
    mutation_probability: f64,
    rng: StdRng,
}

impl GeneticAlgorithm {
    /// Builds the initial population: individual 0 is the identity ordering
    /// with zero rotations (the caller passes parts sorted by area
    /// descending), the rest are mutants of it.
    pub fn new(part_count: usize, config: &NestConfig) -> Self {
        let mut ga = Self {
            population: Vec::with_capacity(config.population_size),
            allowed_rotations: config.allowed_rotations(),
            mutation_probability: config.mutation_probability(),
            rng: StdRng::seed_from_u64(config.seed),
        };

        let seed = Individual::seeded(part_count);
        ga.population.push(seed.clone());
        while ga.population.len() < config.population_size.max(2) {
            let mut mutant = seed.clone();
            ga.mutate(&mut mutant);
            ga.population.push(mutant);
        }
        ga
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    /// Writes evaluation results back, aligned by index.
    pub fn set_fitnesses(&mut self, fitnesses: &[f64]) {
        for (individual, &fitness) in self.population.iter_mut().zip(fitnesses) {
            individual.fitness = Some(fitness);
        }
    }

    /// Sorts the population by fitness ascending. The sort is stable, so
    /// equal fitness keeps the pre-sort index order as tie-break.
    pub fn sort_by_fitness(&mut self) {
        self.population
            .sort_by(|a, b| a.fitness_or_worst().total_cmp(&b.fitness_or_worst()));
    }

    /// Produces the next generation: the best individual survives unchanged,
    /// the remainder comes from tournament selection, order-preserving
    /// crossover and per-gene mutation. Expects a sorted population.
    pub fn evolve(&mut self) {
        let size = self.population.len();
        let mut next = Vec::with_capacity(size);
        next.push(self.population[0].clone());

        while next.len() < size {
            let p1 = self.select();
            let p2 = self.select();
            let mut child = self.crossover(p1, p2);
            self.mutate(&mut child);
            next.push(child);
        }
        self.population = next;
    }

    /// Tournament of two distinct individuals; the better one wins with
    /// probability [`TOURNAMENT_BIAS`]. Ties go to the lower index.
    fn select(&mut self) -> usize {
        let n = self.population.len();
        let i = self.rng.gen_range(0..n);
        let mut j = self.rng.gen_range(0..n);
        while j == i {
            j = self.rng.gen_range(0..n);
        }

        let fi = self.population[i].fitness_or_worst();
        let fj = self.population[j].fitness_or_worst();
        let (better, worse) = if fi < fj || (fi == fj && i < j) {
            (i, j)
        } else {
            (j, i)
        };
        if self.rng.gen::<f64>() < TOURNAMENT_BIAS {
            better
        } else {
            worse
        }
    }

    /// Order-preserving crossover: the child takes parent 1's prefix up to a
    /// random cut, then parent 2's remaining genes in parent 2's order.
    /// Rotations travel with the parent that contributed the gene.
    fn crossover(&mut self, p1: usize, p2: usize) -> Individual {
        let len = self.population[p1].order.len();
        if len < 2 {
            let mut child = self.population[p1].clone();
            child.fitness = None;
            return child;
        }

        let cut = self.rng.gen_range(1..len);
        let parent1 = &self.population[p1];
        let parent2 = &self.population[p2];

        let mut order = parent1.order[..cut].to_vec();
        let mut rotations = parent1.rotations[..cut].to_vec();
        let mut used = vec![false; len];
        for &gene in &order {
            used[gene] = true;
        }
        for (slot, &gene) in parent2.order.iter().enumerate() {
            if !used[gene] {
                used[gene] = true;
                order.push(gene);
                rotations.push(parent2.rotations[slot]);
            }
        }

        Individual {
            order,
            rotations,
            fitness: None,
        }
    }

    /// Per-gene mutation: adjacent swaps in the permutation and independent
    /// rotation resampling, each with the configured probability.
    fn mutate(&mut self, individual: &mut Individual) {
        let len = individual.order.len();
        for i in 0..len {
            let roll: f64 = self.rng.gen();
            if roll < self.mutation_probability && i + 1 < len {
                individual.order.swap(i, i + 1);
            }
        }
        for i in 0..len {
            let roll: f64 = self.rng.gen();
            if roll < self.mutation_probability {
                let pick = self.rng.gen_range(0..self.allowed_rotations.len());
                individual.rotations[i] = self.allowed_rotations[pick];
            }
        }
        individual.fitness = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NestConfig {
        NestConfig::default()
            .with_population_size(6)
            .with_seed(1)
            .with_mutation_rate(50)
    }

    fn is_permutation(order: &[usize]) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..order.len()).collect::<Vec<_>>()
    }

    #[test]
    fn test_initial_population() {
        let ga = GeneticAlgorithm::new(8, &config());
        assert_eq!(ga.population().len(), 6);

        // Individual 0 is the untouched seed.
        assert_eq!(ga.population()[0].order, (0..8).collect::<Vec<_>>());
        assert!(ga.population()[0].rotations.iter().all(|&r| r == 0.0));

        for individual in ga.population() {
            assert!(is_permutation(&individual.order));
            assert_eq!(individual.rotations.len(), 8);
        }
    }

    #[test]
    fn test_crossover_produces_valid_permutation() {
        let mut ga = GeneticAlgorithm::new(10, &config());
        for _ in 0..50 {
            let child = ga.crossover(0, 1);
            assert!(is_permutation(&child.order));
            assert_eq!(child.rotations.len(), 10);
            assert!(child.fitness.is_none());
        }
    }

    #[test]
    fn test_mutation_keeps_permutation_and_allowed_rotations() {
        let cfg = config().with_rotations(4);
        let mut ga = GeneticAlgorithm::new(10, &cfg);
        let allowed = cfg.allowed_rotations();

        let mut individual = Individual::seeded(10);
        for _ in 0..50 {
            ga.mutate(&mut individual);
            assert!(is_permutation(&individual.order));
            assert!(individual
                .rotations
                .iter()
                .all(|r| allowed.iter().any(|a| (a - r).abs() < 1e-12)));
        }
    }

    #[test]
    fn test_elitism_preserves_best() {
        let mut ga = GeneticAlgorithm::new(5, &config());
        let n = ga.population().len();
        let fitnesses: Vec<f64> = (0..n).map(|i| 100.0 - i as f64).collect();
        ga.set_fitnesses(&fitnesses);
        ga.sort_by_fitness();
        let best = ga.population()[0].clone();

        ga.evolve();
        assert_eq!(ga.population()[0].order, best.order);
        assert_eq!(ga.population()[0].rotations, best.rotations);
        assert_eq!(ga.population()[0].fitness, best.fitness);
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let mut ga = GeneticAlgorithm::new(3, &config());
        let n = ga.population().len();
        ga.set_fitnesses(&vec![7.0; n]);
        let before: Vec<Vec<usize>> = ga.population().iter().map(|i| i.order.clone()).collect();
        ga.sort_by_fitness();
        let after: Vec<Vec<usize>> = ga.population().iter().map(|i| i.order.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_same_seed_same_evolution() {
        let run = || {
            let mut ga = GeneticAlgorithm::new(6, &config());
            let n = ga.population().len();
            for gen in 0..5 {
                let fitnesses: Vec<f64> = ga
                    .population()
                    .iter()
                    .enumerate()
                    .map(|(i, ind)| (ind.order[0] * 10 + i + gen) as f64)
                    .collect();
                ga.set_fitnesses(&fitnesses);
                ga.sort_by_fitness();
                ga.evolve();
            }
            ga.population()
                .iter()
                .map(|i| (i.order.clone(), i.rotations.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_single_part_crossover_degenerates_to_clone() {
        let mut ga = GeneticAlgorithm::new(1, &config());
        let child = ga.crossover(0, 1);
        assert_eq!(child.order, vec![0]);
    }
}
