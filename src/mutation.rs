//! Structural and parametric mutation operators.
//!
//! Every operator picks its site from the index layout described in
//! [`genome`](crate::genome): a source is drawn from `[0, inputs + hidden)`
//! and shifted past the output block when it lands at or beyond `inputs`.
//! Sampling is retried at most `num_nodes` times. An operator that finds no
//! legal site is a no-op and reports `false`/`None`; only internal
//! consistency failures surface as errors.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{NeatError, Result};
use crate::gene::{ConnectionGene, NodeRole};
use crate::genome::Genome;

/// The four mutation operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    /// Split an existing connection with a new hidden node.
    AddNode,
    /// Add a new connection between two unconnected nodes.
    AddConnection,
    /// Perturb or resample one connection weight.
    ChangeWeight,
    /// Perturb or resample one connection bias.
    ChangeBias,
}

impl MutationKind {
    /// All operators, in dispatch order.
    pub const ALL: [Self; 4] = [
        Self::AddNode,
        Self::AddConnection,
        Self::ChangeWeight,
        Self::ChangeBias,
    ];
}

/// Which operators [`Genome::mutate`] fires per call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum MutationPolicy {
    /// Exactly one operator, chosen uniformly.
    #[default]
    UniformChoice,
    /// Always tweak one weight or bias (equal odds), then independently roll
    /// for each structural operator.
    Layered {
        /// Probability of a split-connection mutation per call.
        add_node_prob: f64,
        /// Probability of an add-connection mutation per call.
        add_connection_prob: f64,
    },
}

impl MutationPolicy {
    /// Layered policy with rare node splits and frequent new connections.
    #[must_use]
    pub const fn layered() -> Self {
        Self::Layered {
            add_node_prob: 0.05,
            add_connection_prob: 0.8,
        }
    }

    pub(crate) fn validate(self) -> Result<()> {
        if let Self::Layered {
            add_node_prob,
            add_connection_prob,
        } = self
        {
            for (name, p) in [
                ("add_node_prob", add_node_prob),
                ("add_connection_prob", add_connection_prob),
            ] {
                if !(0.0..=1.0).contains(&p) {
                    return Err(NeatError::InvalidConfig(format!(
                        "{name} {p} outside [0, 1]"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Step added to a weight or bias when it is perturbed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Perturbation {
    /// Uniform over `[-magnitude, magnitude]`.
    Uniform(f64),
    /// Normal with mean 0 and the given standard deviation.
    Normal(f64),
}

impl Default for Perturbation {
    fn default() -> Self {
        Self::Uniform(0.1)
    }
}

impl Perturbation {
    /// Draw one step. A zero, negative or non-finite magnitude yields 0.
    pub fn sample<R: Rng>(self, rng: &mut R) -> f64 {
        match self {
            Self::Uniform(magnitude) if magnitude > 0.0 && (2.0 * magnitude).is_finite() => {
                rng.random_range(-magnitude..=magnitude)
            }
            Self::Normal(std_dev) if std_dev > 0.0 && std_dev.is_finite() => {
                let z: f64 = rng.sample(rand_distr::StandardNormal);
                z * std_dev
            }
            Self::Uniform(_) | Self::Normal(_) => 0.0,
        }
    }

    pub(crate) fn validate(self) -> Result<()> {
        let (Self::Uniform(m) | Self::Normal(m)) = self;
        if (2.0 * m).is_finite() && m >= 0.0 {
            Ok(())
        } else {
            Err(NeatError::InvalidConfig(format!(
                "perturbation magnitude {m} must be finite and non-negative"
            )))
        }
    }
}

impl Genome {
    /// The mutation policy in effect for [`Genome::mutate`].
    #[must_use]
    pub fn mutation_policy(&self) -> MutationPolicy {
        self.config().mutation_policy
    }

    /// Apply one round of mutation according to the configured [`MutationPolicy`].
    ///
    /// Returns the operators that actually changed the genome.
    ///
    /// # Errors
    ///
    /// Propagates internal consistency failures from the operators; refused
    /// mutation sites are not errors.
    pub fn mutate<R: Rng>(&mut self, rng: &mut R) -> Result<Vec<MutationKind>> {
        let planned = match self.mutation_policy() {
            MutationPolicy::UniformChoice => {
                vec![MutationKind::ALL[rng.random_range(0..MutationKind::ALL.len())]]
            }
            MutationPolicy::Layered {
                add_node_prob,
                add_connection_prob,
            } => {
                let mut planned = Vec::with_capacity(3);
                planned.push(if rng.random::<bool>() {
                    MutationKind::ChangeWeight
                } else {
                    MutationKind::ChangeBias
                });
                if rng.random::<f64>() < add_node_prob {
                    planned.push(MutationKind::AddNode);
                }
                if rng.random::<f64>() < add_connection_prob {
                    planned.push(MutationKind::AddConnection);
                }
                planned
            }
        };

        let mut applied = Vec::with_capacity(planned.len());
        for kind in planned {
            if self.apply_mutation(kind, rng)? {
                applied.push(kind);
            }
        }
        Ok(applied)
    }

    /// Run a single operator. Returns whether the genome changed.
    ///
    /// # Errors
    ///
    /// Propagates internal consistency failures from the operator.
    pub fn apply_mutation<R: Rng>(&mut self, kind: MutationKind, rng: &mut R) -> Result<bool> {
        match kind {
            MutationKind::AddNode => Ok(self.mutate_add_node(rng)?.is_some()),
            MutationKind::AddConnection => Ok(self.mutate_add_connection(rng)),
            MutationKind::ChangeWeight => self.mutate_change_weight(rng),
            MutationKind::ChangeBias => self.mutate_change_bias(rng),
        }
    }

    /// Draw a non-output node: `[0, inputs + hidden)`, shifted past the outputs.
    fn pick_source<R: Rng>(&self, rng: &mut R) -> Option<usize> {
        let candidates = self.input_count() + self.hidden_count();
        if candidates == 0 {
            return None;
        }
        let index = rng.random_range(0..candidates);
        if index >= self.input_count() {
            Some(index + self.output_count())
        } else {
            Some(index)
        }
    }

    /// Draw an existing connection by first drawing a source that has one.
    fn pick_connection<R: Rng>(&self, rng: &mut R) -> Option<(usize, usize)> {
        for _ in 0..self.num_nodes() {
            let from = self.pick_source(rng)?;
            let outgoing = self.graph().outgoing(from);
            if !outgoing.is_empty() {
                let to = outgoing[rng.random_range(0..outgoing.len())];
                return Some((from, to));
            }
        }
        None
    }

    /// Replace `from -> to` with `from -> new -> to`.
    ///
    /// The first half carries weight 1 and bias 0; the second half keeps the
    /// original weight and bias. Returns the index of the new hidden node.
    ///
    /// # Errors
    ///
    /// - [`NeatError::EdgeNotFound`] if the connection does not exist
    /// - [`NeatError::CycleRejected`] if `from` is reachable from `to`, which
    ///   the acyclic invariant rules out
    /// - [`NeatError::Inconsistent`] if the connection leaves an output node or
    ///   enters an input node, or either half cannot be wired
    ///
    /// The original connection is kept on every error path.
    pub fn split_connection<R: Rng>(&mut self, from: usize, to: usize, rng: &mut R) -> Result<usize> {
        let original = self
            .connection(from, to)
            .filter(|_| self.has_connection(from, to))
            .ok_or(NeatError::EdgeNotFound { from, to })?;
        if self.graph().is_ancestor(to, from) {
            return Err(NeatError::CycleRejected { from, to });
        }
        let roles = (self.node(from).map(|n| n.role), self.node(to).map(|n| n.role));
        if matches!(roles, (Some(NodeRole::Output), _) | (_, Some(NodeRole::Input))) {
            return Err(NeatError::Inconsistent(format!(
                "connection {from} -> {to} violates input -> output layering"
            )));
        }

        let hidden = self.add_node(NodeRole::Hidden)?;
        if !self.add_connection(from, hidden, Some(ConnectionGene::identity()), rng)
            || !self.add_connection(hidden, to, Some(original), rng)
        {
            return Err(NeatError::Inconsistent(format!(
                "hidden node {hidden} could not be wired into {from} -> {to}"
            )));
        }
        self.remove_connection(from, to)?;

        Ok(hidden)
    }

    /// Split a random existing connection with a new hidden node.
    ///
    /// Returns the new node's index, or `None` if no connection could be split.
    ///
    /// # Errors
    ///
    /// Propagates internal consistency failures from [`Genome::split_connection`].
    pub fn mutate_add_node<R: Rng>(&mut self, rng: &mut R) -> Result<Option<usize>> {
        let Some((from, to)) = self.pick_connection(rng) else {
            trace!("add-node: no connection to split");
            return Ok(None);
        };

        match self.split_connection(from, to, rng) {
            Ok(hidden) => {
                debug!(from, to, hidden, "split connection");
                Ok(Some(hidden))
            }
            Err(err) if err.is_rejection() => {
                trace!(from, to, %err, "add-node refused");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Connect a random non-output node to a random non-input node.
    ///
    /// The new connection gets a freshly drawn weight and bias. Returns `false`
    /// if every attempt hit an existing or cycle-closing edge.
    pub fn mutate_add_connection<R: Rng>(&mut self, rng: &mut R) -> bool {
        let targets = self.output_count() + self.hidden_count();
        if targets == 0 {
            return false;
        }

        for _ in 0..self.num_nodes() {
            let Some(from) = self.pick_source(rng) else {
                return false;
            };
            let to = self.input_count() + rng.random_range(0..targets);
            if self.has_connection(from, to) {
                continue;
            }
            if self.add_connection(from, to, None, rng) {
                debug!(from, to, "added connection");
                return true;
            }
        }

        trace!("add-connection: no legal site found");
        false
    }

    /// Perturb or resample the weight of a random connection.
    ///
    /// # Errors
    ///
    /// Returns [`NeatError::EdgeNotFound`] if the graph and the connection
    /// parameters disagree.
    pub fn mutate_change_weight<R: Rng>(&mut self, rng: &mut R) -> Result<bool> {
        let Some((from, to)) = self.pick_connection(rng) else {
            return Ok(false);
        };
        let current = self
            .connection(from, to)
            .ok_or(NeatError::EdgeNotFound { from, to })?
            .weight;
        let weight = self.tweak(current, rng);
        self.set_weight(from, to, weight)?;
        Ok(true)
    }

    /// Perturb or resample the bias of a random connection.
    ///
    /// # Errors
    ///
    /// Returns [`NeatError::EdgeNotFound`] if the graph and the connection
    /// parameters disagree.
    pub fn mutate_change_bias<R: Rng>(&mut self, rng: &mut R) -> Result<bool> {
        let Some((from, to)) = self.pick_connection(rng) else {
            return Ok(false);
        };
        let current = self
            .connection(from, to)
            .ok_or(NeatError::EdgeNotFound { from, to })?
            .bias;
        let bias = self.tweak(current, rng);
        self.set_bias(from, to, bias)?;
        Ok(true)
    }

    /// With `perturb_prob` add a perturbation step, otherwise resample uniformly
    /// over `[-replace_range, replace_range]`.
    fn tweak<R: Rng>(&self, current: f64, rng: &mut R) -> f64 {
        let config = self.config();
        if rng.random::<f64>() < config.perturb_prob {
            current + config.perturbation.sample(rng)
        } else if config.replace_range > 0.0 && (2.0 * config.replace_range).is_finite() {
            rng.random_range(-config.replace_range..=config.replace_range)
        } else {
            0.0
        }
    }
}
