//! Generational driver over a population of genomes.
//!
//! Each [`Population::step`]:
//!
//! 1. evaluates every agent's fitness (in parallel with the `parallel` feature)
//!    and waits for all results,
//! 2. ranks agents according to the [`Comparison`] mode,
//! 3. carries the top `elite_fraction` over unmutated,
//! 4. refills the population with mutated copies of elites drawn by
//!    roulette-wheel sampling.
//!
//! Because elites survive untouched, the best fitness never decreases across
//! generations as long as the fitness function is deterministic.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{NeatError, Result};
use crate::genome::{Genome, GenomeConfig};

/// Scores a genome.
///
/// Implemented for every `Fn(&Genome) -> f64 + Send + Sync`, so closures can
/// be passed directly.
pub trait Fitness: Send + Sync {
    /// Fitness of `genome`; how it is ranked depends on the [`Comparison`] mode.
    fn evaluate(&self, genome: &Genome) -> f64;
}

impl<F> Fitness for F
where
    F: Fn(&Genome) -> f64 + Send + Sync,
{
    fn evaluate(&self, genome: &Genome) -> f64 {
        self(genome)
    }
}

/// How fitness values are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Comparison {
    /// Higher is better.
    Above,
    /// Lower is better.
    Below,
    /// Closer to the threshold is better.
    ClosestTo(f64),
}

impl Comparison {
    /// Sort key where lower is better. NaN ranks last.
    fn rank_key(self, fitness: f64) -> f64 {
        let key = match self {
            Self::Above => -fitness,
            Self::Below => fitness,
            Self::ClosestTo(threshold) => (fitness - threshold).abs(),
        };
        if key.is_nan() {
            f64::INFINITY
        } else {
            key
        }
    }

    /// Whether fitness `a` ranks strictly ahead of `b`.
    #[must_use]
    pub fn is_better(self, a: f64, b: f64) -> bool {
        self.rank_key(a) < self.rank_key(b)
    }

    /// Roulette weight of `fitness` given the best fitness among candidates.
    ///
    /// `Above` uses the fitness itself (negative values get no share); the
    /// other modes weight by inverse distance from the best value.
    fn selection_weight(self, fitness: f64, best: f64) -> f64 {
        if fitness.is_nan() {
            return 0.0;
        }
        let weight = match self {
            Self::Above => fitness.max(0.0),
            Self::Below => 1.0 / (1.0 + (fitness - best).max(0.0)),
            Self::ClosestTo(threshold) => 1.0 / (1.0 + (fitness - threshold).abs()),
        };
        if weight.is_finite() {
            weight
        } else {
            0.0
        }
    }
}

/// Configuration for the generational driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of agents, kept constant across generations.
    pub size: usize,
    /// Fraction of top-ranked agents carried over unmutated, in `(0, 1]`.
    pub elite_fraction: f64,
    /// Number of [`Genome::mutate`] calls applied to each offspring.
    pub mutations_per_offspring: usize,
    /// Ranking mode.
    pub comparison: Comparison,
    /// Stop threshold for `Above` (best > target) and `Below` (best < target).
    /// `None` runs until the generation cap.
    pub target: Option<f64>,
    /// Stop tolerance for `ClosestTo`: |best - threshold| < tolerance.
    pub tolerance: f64,
    /// Seed for the driver's random source.
    pub seed: u64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: 1000,
            elite_fraction: 0.35,
            mutations_per_offspring: 5,
            comparison: Comparison::Above,
            target: None,
            tolerance: 0.01,
            seed: 0,
        }
    }
}

impl PopulationConfig {
    /// Number of agents carried over each generation (at least one).
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn elite_count(&self) -> usize {
        ((self.size as f64 * self.elite_fraction) as usize).clamp(1, self.size.max(1))
    }

    /// Whether `best` satisfies the stop condition.
    #[must_use]
    pub fn reached(&self, best: f64) -> bool {
        match self.comparison {
            Comparison::Above => self.target.is_some_and(|target| best > target),
            Comparison::Below => self.target.is_some_and(|target| best < target),
            Comparison::ClosestTo(threshold) => (best - threshold).abs() < self.tolerance,
        }
    }

    /// Check sizes, fractions and thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`NeatError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(NeatError::InvalidConfig("population size must be non-zero".into()));
        }
        if !(self.elite_fraction > 0.0 && self.elite_fraction <= 1.0) {
            return Err(NeatError::InvalidConfig(format!(
                "elite_fraction {} outside (0, 1]",
                self.elite_fraction
            )));
        }
        if self.target.is_some_and(f64::is_nan) {
            return Err(NeatError::InvalidConfig("target must not be NaN".into()));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(NeatError::InvalidConfig(format!(
                "tolerance {} must be finite and non-negative",
                self.tolerance
            )));
        }
        if let Comparison::ClosestTo(threshold) = self.comparison {
            if !threshold.is_finite() {
                return Err(NeatError::InvalidConfig(format!(
                    "ClosestTo threshold {threshold} must be finite"
                )));
            }
        }
        Ok(())
    }
}

/// One member of the population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// The agent's network.
    pub genome: Genome,
    /// Fitness from the most recent evaluation; NaN until evaluated.
    pub fitness: f64,
}

/// Summary of one evaluated generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Zero-based generation number.
    pub generation: usize,
    /// Fitness of the top-ranked agent.
    pub best_fitness: f64,
    /// Mean over agents with a finite fitness (NaN if there are none).
    pub mean_fitness: f64,
    /// Node count of the top-ranked agent.
    pub best_nodes: usize,
    /// Connection count of the top-ranked agent.
    pub best_connections: usize,
}

/// Result of [`Population::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Number of generations evaluated in this run.
    pub generations: usize,
    /// Best fitness of the final generation.
    pub best_fitness: f64,
    /// Whether the stop condition was met before the cap.
    pub reached_target: bool,
    /// Per-generation statistics.
    pub history: Vec<GenerationStats>,
}

/// A population of genomes evolved against a [`Fitness`] function.
pub struct Population<F> {
    agents: Vec<Agent>,
    config: PopulationConfig,
    genome_config: GenomeConfig,
    fitness: F,
    rng: ChaCha8Rng,
    generation: usize,
}

impl<F: Fitness> Population<F> {
    /// Create `config.size` freshly initialised agents.
    ///
    /// # Errors
    ///
    /// Returns [`NeatError::InvalidConfig`] if either configuration is invalid.
    pub fn new(genome_config: GenomeConfig, config: PopulationConfig, fitness: F) -> Result<Self> {
        config.validate()?;

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let agents = (0..config.size)
            .map(|_| {
                Genome::init(genome_config.clone(), &mut rng).map(|genome| Agent {
                    genome,
                    fitness: f64::NAN,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            agents,
            config,
            genome_config,
            fitness,
            rng,
            generation: 0,
        })
    }

    /// Score every agent. Returns once all evaluations have finished.
    pub fn evaluate(&mut self) {
        let fitness = &self.fitness;

        #[cfg(feature = "parallel")]
        self.agents
            .par_iter_mut()
            .for_each(|agent| agent.fitness = fitness.evaluate(&agent.genome));

        #[cfg(not(feature = "parallel"))]
        self.agents
            .iter_mut()
            .for_each(|agent| agent.fitness = fitness.evaluate(&agent.genome));
    }

    /// Sort agents best-first by the comparison mode.
    fn rank(&mut self) {
        let comparison = self.config.comparison;
        self.agents.sort_by(|a, b| {
            comparison
                .rank_key(a.fitness)
                .total_cmp(&comparison.rank_key(b.fitness))
        });
    }

    fn stats(&self) -> GenerationStats {
        let finite: Vec<f64> = self
            .agents
            .iter()
            .map(|a| a.fitness)
            .filter(|f| f.is_finite())
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let mean_fitness = if finite.is_empty() {
            f64::NAN
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        };

        let best = &self.agents[0];
        GenerationStats {
            generation: self.generation,
            best_fitness: best.fitness,
            mean_fitness,
            best_nodes: best.genome.num_nodes(),
            best_connections: best.genome.num_connections(),
        }
    }

    /// Keep the elite, refill the rest with mutated copies of roulette-selected elites.
    fn regenerate(&mut self) -> Result<()> {
        let elite_count = self.config.elite_count();
        let comparison = self.config.comparison;
        let best = self.agents[0].fitness;

        let weights: Vec<f64> = self.agents[..elite_count]
            .iter()
            .map(|a| comparison.selection_weight(a.fitness, best))
            .collect();
        // Degenerate weights (all zero) fall back to uniform sampling.
        let wheel = WeightedIndex::new(&weights).ok();

        self.agents.truncate(elite_count);
        for _ in elite_count..self.config.size {
            let parent = match &wheel {
                Some(wheel) => wheel.sample(&mut self.rng),
                None => self.rng.random_range(0..elite_count),
            };
            let mut genome = self.agents[parent].genome.clone();
            for _ in 0..self.config.mutations_per_offspring {
                genome.mutate(&mut self.rng)?;
            }
            self.agents.push(Agent {
                genome,
                fitness: f64::NAN,
            });
        }

        debug!(
            elite = elite_count,
            offspring = self.config.size - elite_count,
            uniform = wheel.is_none(),
            "population regenerated"
        );
        Ok(())
    }

    /// Run one generation: evaluate, rank, record, regenerate.
    ///
    /// Returns statistics for the generation that was just evaluated. After
    /// the call the elites sit at the front of [`Population::agents`] with
    /// their fitness intact.
    ///
    /// # Errors
    ///
    /// Propagates internal consistency failures from mutation.
    pub fn step(&mut self) -> Result<GenerationStats> {
        self.evaluate();
        self.rank();
        let stats = self.stats();
        self.regenerate()?;
        self.generation += 1;

        info!(
            generation = stats.generation,
            best = stats.best_fitness,
            mean = stats.mean_fitness,
            nodes = stats.best_nodes,
            connections = stats.best_connections,
            "generation evaluated"
        );
        Ok(stats)
    }

    /// Step until the best agent meets the stop condition or `max_generations` have run.
    ///
    /// # Errors
    ///
    /// Propagates internal consistency failures from mutation.
    pub fn run(&mut self, max_generations: usize) -> Result<RunOutcome> {
        let mut history = Vec::with_capacity(max_generations);

        for _ in 0..max_generations {
            let stats = self.step()?;
            history.push(stats);
            if self.config.reached(stats.best_fitness) {
                info!(
                    generation = stats.generation,
                    best = stats.best_fitness,
                    "stop condition reached"
                );
                return Ok(RunOutcome {
                    generations: history.len(),
                    best_fitness: stats.best_fitness,
                    reached_target: true,
                    history,
                });
            }
        }

        let best_fitness = history.last().map_or(f64::NAN, |s| s.best_fitness);
        info!(
            generations = history.len(),
            best = best_fitness,
            "generation cap reached"
        );
        Ok(RunOutcome {
            generations: history.len(),
            best_fitness,
            reached_target: false,
            history,
        })
    }

    /// All agents. After a [`step`](Self::step) the elites come first, best-first.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// The top-ranked agent of the last evaluated generation.
    ///
    /// Before the first step this is an unevaluated agent with NaN fitness.
    #[must_use]
    pub fn best(&self) -> Option<&Agent> {
        self.agents.first()
    }

    /// Number of completed generations.
    #[must_use]
    pub const fn generation(&self) -> usize {
        self.generation
    }

    /// Driver configuration.
    #[must_use]
    pub const fn config(&self) -> &PopulationConfig {
        &self.config
    }

    /// Configuration used for every genome in the population.
    #[must_use]
    pub const fn genome_config(&self) -> &GenomeConfig {
        &self.genome_config
    }
}
