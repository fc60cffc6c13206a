//! # DAG NEAT
//!
//! NeuroEvolution of Augmenting Topologies over genomes that are guaranteed
//! to stay directed acyclic graphs.
//!
//! ## Features
//!
//! - **Cycle-Safe Structure**: every edge insertion is checked against the
//!   existing ancestry and verified after the fact; a refused edge leaves the
//!   graph untouched
//! - **Dense Indices**: nodes are appended and never removed, so a node index
//!   stays valid for the lifetime of the genome
//! - **Deterministic Mutation**: all randomness comes from a caller-supplied
//!   [`rand::Rng`], so seeded runs are reproducible
//! - **Parallel Evaluation**: [`Population`] scores agents with rayon when the
//!   `parallel` feature (on by default) is enabled
//!
//! ## Quick Start
//!
//! ```rust
//! use dag_neat::{Genome, GenomeConfig};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let mut genome = Genome::init(GenomeConfig::new(2, 1), &mut rng).unwrap();
//!
//! for _ in 0..10 {
//!     genome.mutate(&mut rng).unwrap();
//! }
//! assert!(!genome.graph().has_cycle());
//!
//! let output = genome.forward(&[0.5, -0.5]).unwrap();
//! assert_eq!(output.len(), 1);
//! ```
//!
//! ## Evolving a Population
//!
//! ```rust
//! use dag_neat::{Comparison, Genome, GenomeConfig, Population, PopulationConfig};
//!
//! // Regress y = 2x with a linear output.
//! let fitness = |genome: &Genome| {
//!     let error: f64 = [-1.0, 0.0, 1.0]
//!         .iter()
//!         .map(|&x| match genome.forward(&[x]) {
//!             Ok(out) => (out[0] - 2.0 * x).powi(2),
//!             Err(_) => f64::INFINITY,
//!         })
//!         .sum();
//!     -error
//! };
//!
//! let config = PopulationConfig {
//!     size: 50,
//!     comparison: Comparison::Above,
//!     target: Some(-0.01),
//!     ..PopulationConfig::default()
//! };
//! let mut population = Population::new(GenomeConfig::linear(1, 1), config, fitness).unwrap();
//! let outcome = population.run(5).unwrap();
//! assert!(outcome.generations <= 5);
//! ```
//!
//! ## Architecture
//!
//! ### Graph and Genome
//!
//! [`Graph`] owns structure only: outgoing adjacency and incoming counts per
//! node. [`Genome`] pairs it with a [`NodeGene`] per node holding the role,
//! activation and outgoing [`ConnectionGene`] parameters. Node indices follow
//! a fixed layout (inputs, then outputs, then hidden nodes) that the mutation
//! operators sample from.
//!
//! ### Forward Pass
//!
//! Nodes are visited in order of longest-path depth. Each edge contributes
//! `activation(source)(value[source] * weight + bias)` to its destination;
//! output nodes apply their own activation once all contributions are in.

pub mod activation;
pub mod error;
pub mod gene;
pub mod genome;
pub mod graph;
pub mod mutation;
pub mod population;

// Re-exports for convenience
pub use activation::Activation;
pub use error::{NeatError, Result};
pub use gene::{ConnectionGene, NodeGene, NodeRole};
pub use genome::{Genome, GenomeConfig, WeightInit};
pub use graph::Graph;
pub use mutation::{MutationKind, MutationPolicy, Perturbation};
pub use population::{
    Agent, Comparison, Fitness, GenerationStats, Population, PopulationConfig, RunOutcome,
};
