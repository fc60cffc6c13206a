//! Genome: a [`Graph`] plus per-node and per-connection parameters.
//!
//! Node indices follow a fixed layout that the mutation operators rely on:
//!
//! ```text
//! [0, inputs)                      input nodes
//! [inputs, inputs + outputs)       output nodes
//! [inputs + outputs, node_count)   hidden nodes
//! ```
//!
//! [`Genome::add_node`] refuses any request that would break this layout.
//! The graph only grows; connections may be removed and re-added.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::activation::Activation;
use crate::error::{NeatError, Result};
use crate::gene::{ConnectionGene, NodeGene, NodeRole};
use crate::graph::Graph;
use crate::mutation::{MutationPolicy, Perturbation};

/// Distribution used for fresh connection weights and biases.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeightInit {
    /// Uniform over `[low, high)`.
    Uniform {
        /// Inclusive lower bound.
        low: f64,
        /// Exclusive upper bound.
        high: f64,
    },
    /// Standard normal, mean 0 and standard deviation 1.
    StandardNormal,
}

impl Default for WeightInit {
    fn default() -> Self {
        Self::Uniform {
            low: -1.0,
            high: 1.0,
        }
    }
}

impl WeightInit {
    /// Draw one value.
    ///
    /// An empty or non-finite uniform range yields `low` when it is finite
    /// and 0 otherwise.
    pub fn sample<R: Rng>(self, rng: &mut R) -> f64 {
        match self {
            Self::Uniform { low, high } if high > low && (high - low).is_finite() => {
                rng.random_range(low..high)
            }
            Self::Uniform { low, .. } if low.is_finite() => low,
            Self::Uniform { .. } => 0.0,
            Self::StandardNormal => rng.sample(rand_distr::StandardNormal),
        }
    }
}

/// Configuration for genome creation and mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeConfig {
    /// Number of input nodes.
    pub num_inputs: usize,
    /// Number of output nodes.
    pub num_outputs: usize,
    /// Activation for output nodes.
    pub output_activation: Activation,
    /// Activation for hidden nodes created by the split mutation.
    pub hidden_activation: Activation,
    /// Distribution for fresh weights and biases.
    pub weight_init: WeightInit,
    /// Which operators [`Genome::mutate`] fires per call.
    pub mutation_policy: MutationPolicy,
    /// Step applied when a weight or bias is perturbed.
    pub perturbation: Perturbation,
    /// Probability of perturbing rather than resampling a weight or bias.
    pub perturb_prob: f64,
    /// Resampled weights and biases are uniform over `[-replace_range, replace_range]`.
    pub replace_range: f64,
}

impl Default for GenomeConfig {
    fn default() -> Self {
        Self {
            num_inputs: 1,
            num_outputs: 1,
            output_activation: Activation::ReLU,
            hidden_activation: Activation::ReLU,
            weight_init: WeightInit::default(),
            mutation_policy: MutationPolicy::default(),
            perturbation: Perturbation::default(),
            perturb_prob: 0.75,
            replace_range: 1.0,
        }
    }
}

impl GenomeConfig {
    /// Config with ReLU output and hidden nodes.
    #[must_use]
    pub fn new(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            num_inputs,
            num_outputs,
            ..Default::default()
        }
    }

    /// Config with linear output nodes, handy for regression targets.
    #[must_use]
    pub fn linear(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            num_inputs,
            num_outputs,
            output_activation: Activation::Linear,
            ..Default::default()
        }
    }

    /// Check that every probability and range is usable.
    ///
    /// # Errors
    ///
    /// Returns [`NeatError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.perturb_prob) {
            return Err(NeatError::InvalidConfig(format!(
                "perturb_prob {} outside [0, 1]",
                self.perturb_prob
            )));
        }
        if !(2.0 * self.replace_range).is_finite() || self.replace_range < 0.0 {
            return Err(NeatError::InvalidConfig(format!(
                "replace_range {} must be finite and non-negative",
                self.replace_range
            )));
        }
        if let WeightInit::Uniform { low, high } = self.weight_init {
            if !(high - low).is_finite() || low > high {
                return Err(NeatError::InvalidConfig(format!(
                    "weight_init range [{low}, {high}) is empty or non-finite"
                )));
            }
        }
        self.perturbation.validate()?;
        self.mutation_policy.validate()
    }
}

/// One evolvable feed-forward network.
///
/// `Clone` is a deep copy: the clone shares no storage with the original.
/// Deserialization checks that roles, counters, graph edges and connection
/// parameters all agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGenome")]
pub struct Genome {
    graph: Graph,
    /// Indexed by node index, in lock-step with `graph`.
    nodes: Vec<NodeGene>,
    input_count: usize,
    output_count: usize,
    hidden_count: usize,
    config: GenomeConfig,
}

/// Unchecked serialized form of [`Genome`].
#[derive(Deserialize)]
struct RawGenome {
    graph: Graph,
    nodes: Vec<NodeGene>,
    input_count: usize,
    output_count: usize,
    hidden_count: usize,
    config: GenomeConfig,
}

impl TryFrom<RawGenome> for Genome {
    type Error = NeatError;

    fn try_from(raw: RawGenome) -> Result<Self> {
        raw.config.validate()?;
        let genome = Self {
            graph: raw.graph,
            nodes: raw.nodes,
            input_count: raw.input_count,
            output_count: raw.output_count,
            hidden_count: raw.hidden_count,
            config: raw.config,
        };
        genome.check_consistency()?;
        Ok(genome)
    }
}

impl Genome {
    /// Create a genome with no nodes.
    #[must_use]
    pub fn empty(config: GenomeConfig) -> Self {
        let capacity = config.num_inputs + config.num_outputs;
        Self {
            graph: Graph::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            input_count: 0,
            output_count: 0,
            hidden_count: 0,
            config,
        }
    }

    /// Create the input/output skeleton with every input connected to every output.
    ///
    /// Each connection gets an independently drawn weight and bias.
    ///
    /// # Errors
    ///
    /// Returns [`NeatError::InvalidConfig`] if `config` fails
    /// [`GenomeConfig::validate`].
    pub fn init<R: Rng>(config: GenomeConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let (inputs, outputs) = (config.num_inputs, config.num_outputs);
        let mut genome = Self::empty(config);

        for _ in 0..inputs {
            genome.push_node(NodeRole::Input);
        }
        for _ in 0..outputs {
            genome.push_node(NodeRole::Output);
        }

        for from in 0..inputs {
            for to in inputs..inputs + outputs {
                let connected = genome.add_connection(from, to, None, rng);
                debug_assert!(connected, "skeleton edge {from} -> {to} refused");
            }
        }

        Ok(genome)
    }

    /// Check that counters, roles, graph edges and connection parameters agree.
    fn check_consistency(&self) -> Result<()> {
        let count = self.nodes.len();
        if self.graph.node_count() != count {
            return Err(NeatError::Inconsistent(format!(
                "graph has {} nodes, metadata has {count}",
                self.graph.node_count()
            )));
        }
        if self.input_count + self.output_count + self.hidden_count != count {
            return Err(NeatError::Inconsistent(format!(
                "role counters {} + {} + {} do not sum to {count} nodes",
                self.input_count, self.output_count, self.hidden_count
            )));
        }

        let outputs = self.output_range();
        for (index, node) in self.nodes.iter().enumerate() {
            let expected = if index < self.input_count {
                NodeRole::Input
            } else if outputs.contains(&index) {
                NodeRole::Output
            } else {
                NodeRole::Hidden
            };
            if node.role != expected {
                return Err(NeatError::Inconsistent(format!(
                    "node {index} is {:?}, layout expects {expected:?}",
                    node.role
                )));
            }

            let mut edges = self.graph.outgoing(index).to_vec();
            edges.sort_unstable();
            if !edges.iter().eq(node.connections.keys()) {
                return Err(NeatError::Inconsistent(format!(
                    "node {index} edges {edges:?} do not match its connection parameters"
                )));
            }
            if !edges.is_empty() && node.role == NodeRole::Output {
                return Err(NeatError::Inconsistent(format!(
                    "output node {index} has outgoing connections"
                )));
            }
            if let Some(&to) = edges.iter().find(|&&to| to < self.input_count) {
                return Err(NeatError::Inconsistent(format!(
                    "connection {index} -> {to} enters an input node"
                )));
            }
        }
        Ok(())
    }

    /// Append a node of the given role and return its index.
    ///
    /// # Errors
    ///
    /// Returns [`NeatError::RoleOutOfOrder`] if the node would break the index
    /// layout: inputs must precede outputs, outputs must precede hidden nodes.
    pub fn add_node(&mut self, role: NodeRole) -> Result<usize> {
        let in_order = match role {
            NodeRole::Input => self.output_count == 0 && self.hidden_count == 0,
            NodeRole::Output => self.hidden_count == 0,
            NodeRole::Hidden => true,
        };
        if !in_order {
            return Err(NeatError::RoleOutOfOrder { role });
        }
        Ok(self.push_node(role))
    }

    fn push_node(&mut self, role: NodeRole) -> usize {
        let activation = match role {
            NodeRole::Input => {
                self.input_count += 1;
                Activation::Linear
            }
            NodeRole::Output => {
                self.output_count += 1;
                self.config.output_activation
            }
            NodeRole::Hidden => {
                self.hidden_count += 1;
                self.config.hidden_activation
            }
        };
        let index = self.graph.add_node();
        self.nodes.push(NodeGene::new(role, activation));
        debug_assert_eq!(index + 1, self.nodes.len());
        index
    }

    /// Add the connection `from -> to`.
    ///
    /// Uses `params` when given, otherwise draws a fresh weight and bias from
    /// the configured [`WeightInit`]. Returns `false` without changing anything
    /// if the graph refuses the edge (unknown node, duplicate, cycle) or if it
    /// would leave an output node or enter an input node.
    pub fn add_connection<R: Rng>(
        &mut self,
        from: usize,
        to: usize,
        params: Option<ConnectionGene>,
        rng: &mut R,
    ) -> bool {
        let roles = (
            self.nodes.get(from).map(|n| n.role),
            self.nodes.get(to).map(|n| n.role),
        );
        if matches!(roles, (Some(NodeRole::Output), _) | (_, Some(NodeRole::Input))) {
            trace!(from, to, "connection refused: violates input -> output layering");
            return false;
        }

        if !self.graph.add_edge(from, to) {
            return false;
        }

        let gene = params.unwrap_or_else(|| {
            ConnectionGene::new(
                self.config.weight_init.sample(rng),
                self.config.weight_init.sample(rng),
            )
        });
        self.nodes[from].connections.insert(to, gene);
        true
    }

    /// Remove the connection `from -> to`, returning its parameters if it existed.
    ///
    /// # Errors
    ///
    /// - [`NeatError::InvalidIndex`] if either endpoint does not exist
    /// - [`NeatError::EdgeNotFound`] if the graph has the edge but no parameters
    ///   are recorded for it; nothing is removed in that case
    pub fn remove_connection(&mut self, from: usize, to: usize) -> Result<Option<ConnectionGene>> {
        let gene = self
            .nodes
            .get(from)
            .and_then(|n| n.connections.get(&to))
            .copied();
        if gene.is_none() && self.graph.is_parent(from, to) {
            return Err(NeatError::EdgeNotFound { from, to });
        }

        if !self.graph.remove_edge(from, to)? {
            return Ok(None);
        }
        self.nodes[from].connections.remove(&to);
        Ok(gene)
    }

    fn connection_mut(&mut self, from: usize, to: usize) -> Result<&mut ConnectionGene> {
        if !self.graph.is_parent(from, to) {
            return Err(NeatError::EdgeNotFound { from, to });
        }
        self.nodes
            .get_mut(from)
            .and_then(|n| n.connections.get_mut(&to))
            .ok_or(NeatError::EdgeNotFound { from, to })
    }

    /// Overwrite the weight of `from -> to`, leaving its bias untouched.
    ///
    /// # Errors
    ///
    /// Returns [`NeatError::EdgeNotFound`] if the connection does not exist.
    pub fn set_weight(&mut self, from: usize, to: usize, weight: f64) -> Result<()> {
        self.connection_mut(from, to)?.weight = weight;
        Ok(())
    }

    /// Overwrite the bias of `from -> to`, leaving its weight untouched.
    ///
    /// # Errors
    ///
    /// Returns [`NeatError::EdgeNotFound`] if the connection does not exist.
    pub fn set_bias(&mut self, from: usize, to: usize, bias: f64) -> Result<()> {
        self.connection_mut(from, to)?.bias = bias;
        Ok(())
    }

    /// Evaluate the network.
    ///
    /// Nodes are visited in topological order. Each node sends
    /// `activation(node)(value[node] * weight + bias)` along every outgoing
    /// connection, so the activation of the *source* shapes each contribution.
    /// Output nodes only accumulate during propagation; their own activation is
    /// applied to the final sum. All scratch state is local to the call.
    ///
    /// # Errors
    ///
    /// Returns [`NeatError::InputSizeMismatch`] if `inputs.len()` differs from
    /// the number of input nodes.
    pub fn forward(&self, inputs: &[f64]) -> Result<Vec<f64>> {
        if inputs.len() != self.input_count {
            return Err(NeatError::InputSizeMismatch {
                expected: self.input_count,
                actual: inputs.len(),
            });
        }

        let mut values = vec![0.0; self.graph.node_count()];
        values[..self.input_count].copy_from_slice(inputs);

        for index in self.graph.topological_order() {
            let node = &self.nodes[index];
            let value = values[index];
            for (&to, conn) in &node.connections {
                values[to] += node.activation.apply(value.mul_add(conn.weight, conn.bias));
            }
        }

        Ok(self
            .output_range()
            .map(|i| self.nodes[i].activation.apply(values[i]))
            .collect())
    }

    /// The configuration this genome was built with.
    #[must_use]
    pub const fn config(&self) -> &GenomeConfig {
        &self.config
    }

    /// The underlying structural graph.
    #[must_use]
    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Metadata for one node.
    #[must_use]
    pub fn node(&self, index: usize) -> Option<&NodeGene> {
        self.nodes.get(index)
    }

    /// Metadata for all nodes, indexed by node index.
    #[must_use]
    pub fn nodes(&self) -> &[NodeGene] {
        &self.nodes
    }

    /// Total number of nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of input nodes.
    #[must_use]
    pub const fn input_count(&self) -> usize {
        self.input_count
    }

    /// Number of output nodes.
    #[must_use]
    pub const fn output_count(&self) -> usize {
        self.output_count
    }

    /// Number of hidden nodes.
    #[must_use]
    pub const fn hidden_count(&self) -> usize {
        self.hidden_count
    }

    /// Indices of the output nodes.
    #[must_use]
    pub fn output_range(&self) -> std::ops::Range<usize> {
        self.input_count..self.input_count + self.output_count
    }

    /// Indices of the hidden nodes.
    #[must_use]
    pub fn hidden_ids(&self) -> std::ops::Range<usize> {
        self.input_count + self.output_count..self.nodes.len()
    }

    /// Number of connections.
    #[must_use]
    pub fn num_connections(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the connection `from -> to` exists.
    #[must_use]
    pub fn has_connection(&self, from: usize, to: usize) -> bool {
        self.graph.is_parent(from, to)
    }

    /// Parameters of `from -> to`, if the connection exists.
    #[must_use]
    pub fn connection(&self, from: usize, to: usize) -> Option<ConnectionGene> {
        self.nodes.get(from)?.connections.get(&to).copied()
    }

    /// Iterate over all connections as `(from, to, params)`, ordered by `(from, to)`.
    pub fn connections(&self) -> impl Iterator<Item = (usize, usize, ConnectionGene)> + '_ {
        self.nodes.iter().enumerate().flat_map(|(from, node)| {
            node.connections
                .iter()
                .map(move |(&to, &gene)| (from, to, gene))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    /// Input 0, output 1, hidden 2 wired 0 -> 2 -> 1.
    fn chain_genome(hidden: Activation, rng: &mut ChaCha8Rng) -> Genome {
        let config = GenomeConfig {
            hidden_activation: hidden,
            ..GenomeConfig::linear(1, 1)
        };
        let mut genome = Genome::empty(config);
        genome.add_node(NodeRole::Input).unwrap();
        genome.add_node(NodeRole::Output).unwrap();
        genome.add_node(NodeRole::Hidden).unwrap();
        assert!(genome.add_connection(0, 2, Some(ConnectionGene::new(2.0, 1.0)), rng));
        assert!(genome.add_connection(2, 1, Some(ConnectionGene::new(-1.0, 0.5)), rng));
        genome
    }

    #[test]
    fn test_init_skeleton() {
        let mut rng = test_rng();
        let genome = Genome::init(GenomeConfig::new(2, 1), &mut rng).unwrap();

        assert_eq!(genome.num_nodes(), 3);
        assert_eq!(genome.input_count(), 2);
        assert_eq!(genome.output_count(), 1);
        assert_eq!(genome.hidden_count(), 0);
        assert_eq!(genome.node(0).unwrap().role, NodeRole::Input);
        assert_eq!(genome.node(1).unwrap().role, NodeRole::Input);
        assert_eq!(genome.node(2).unwrap().role, NodeRole::Output);
        assert_eq!(genome.node(0).unwrap().activation, Activation::Linear);
        assert_eq!(genome.node(2).unwrap().activation, Activation::ReLU);

        assert_eq!(genome.num_connections(), 2);
        assert!(genome.has_connection(0, 2));
        assert!(genome.has_connection(1, 2));
        let edges: Vec<(usize, usize)> = genome.connections().map(|(f, t, _)| (f, t)).collect();
        assert_eq!(edges, vec![(0, 2), (1, 2)]);
    }

    #[test]
    fn test_init_weights_within_range() {
        let mut rng = test_rng();
        let genome = Genome::init(GenomeConfig::new(4, 3), &mut rng).unwrap();

        assert_eq!(genome.num_connections(), 12);
        for (_, _, gene) in genome.connections() {
            assert!((-1.0..1.0).contains(&gene.weight));
            assert!((-1.0..1.0).contains(&gene.bias));
        }
    }

    #[test]
    fn test_forward_zero_parameters() {
        let mut rng = test_rng();
        let mut genome = Genome::init(GenomeConfig::linear(1, 1), &mut rng).unwrap();
        genome.set_weight(0, 1, 0.0).unwrap();
        genome.set_bias(0, 1, 0.0).unwrap();

        for x in [-3.5, 0.0, 1.0, 42.0] {
            let out = genome.forward(&[x]).unwrap();
            assert_eq!(out, vec![0.0]);
        }
    }

    #[test]
    fn test_forward_applies_source_activation() {
        let mut rng = test_rng();
        let genome = chain_genome(Activation::ReLU, &mut rng);

        // 3 * 2 + 1 = 7 reaches the hidden node; relu(7 * -1 + 0.5) = 0
        let out = genome.forward(&[3.0]).unwrap();
        assert!(out[0].abs() < 1e-12);

        // -3 * 2 + 1 = -5; relu(-5 * -1 + 0.5) = 5.5
        let out = genome.forward(&[-3.0]).unwrap();
        assert!((out[0] - 5.5).abs() < 1e-12);
    }

    #[test]
    fn test_forward_finalizes_outputs() {
        let mut rng = test_rng();
        let config = GenomeConfig {
            output_activation: Activation::Sigmoid,
            ..GenomeConfig::new(1, 1)
        };
        let mut genome = Genome::init(config, &mut rng).unwrap();
        genome.set_weight(0, 1, 0.0).unwrap();
        genome.set_bias(0, 1, 0.0).unwrap();

        let out = genome.forward(&[5.0]).unwrap();
        assert!((out[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_forward_input_mismatch() {
        let mut rng = test_rng();
        let genome = Genome::init(GenomeConfig::new(2, 1), &mut rng).unwrap();

        assert_eq!(
            genome.forward(&[1.0]),
            Err(NeatError::InputSizeMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_forward_deterministic() {
        let mut rng = test_rng();
        let genome = Genome::init(GenomeConfig::new(3, 2), &mut rng).unwrap();

        let a = genome.forward(&[0.5, -0.5, 1.0]).unwrap();
        let b = genome.forward(&[0.5, -0.5, 1.0]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_add_node_layout_enforced() {
        let mut genome = Genome::empty(GenomeConfig::new(0, 0));
        assert_eq!(genome.add_node(NodeRole::Input), Ok(0));
        assert_eq!(genome.add_node(NodeRole::Output), Ok(1));
        assert_eq!(
            genome.add_node(NodeRole::Input),
            Err(NeatError::RoleOutOfOrder {
                role: NodeRole::Input
            })
        );
        assert_eq!(genome.add_node(NodeRole::Hidden), Ok(2));
        assert!(genome.add_node(NodeRole::Output).is_err());
        assert_eq!(genome.num_nodes(), 3);
        assert_eq!(genome.graph().node_count(), 3);
        assert_eq!(genome.hidden_ids(), 2..3);
    }

    #[test]
    fn test_add_connection_explicit_zero_params() {
        let mut rng = test_rng();
        let mut genome = Genome::empty(GenomeConfig::new(1, 1));
        genome.add_node(NodeRole::Input).unwrap();
        genome.add_node(NodeRole::Output).unwrap();

        assert!(genome.add_connection(0, 1, Some(ConnectionGene::new(0.0, 0.0)), &mut rng));
        assert_eq!(genome.connection(0, 1), Some(ConnectionGene::new(0.0, 0.0)));
    }

    #[test]
    fn test_add_connection_rejections() {
        let mut rng = test_rng();
        let mut genome = chain_genome(Activation::ReLU, &mut rng);

        // duplicate
        assert!(!genome.add_connection(0, 2, None, &mut rng));
        // out of output, into input
        assert!(!genome.add_connection(1, 2, None, &mut rng));
        assert!(!genome.add_connection(2, 0, None, &mut rng));
        // unknown node
        assert!(!genome.add_connection(0, 9, None, &mut rng));

        // would close 2 -> 3 -> 2
        let hidden = genome.add_node(NodeRole::Hidden).unwrap();
        assert!(genome.add_connection(2, hidden, None, &mut rng));
        assert!(!genome.add_connection(hidden, 2, None, &mut rng));

        assert_eq!(genome.num_connections(), 3);
        assert_eq!(genome.connection(0, 2), Some(ConnectionGene::new(2.0, 1.0)));
    }

    #[test]
    fn test_remove_connection() {
        let mut rng = test_rng();
        let mut genome = chain_genome(Activation::ReLU, &mut rng);

        assert_eq!(
            genome.remove_connection(0, 2),
            Ok(Some(ConnectionGene::new(2.0, 1.0)))
        );
        assert!(!genome.has_connection(0, 2));
        assert_eq!(genome.connection(0, 2), None);
        assert_eq!(genome.remove_connection(0, 2), Ok(None));
        assert!(matches!(
            genome.remove_connection(0, 17),
            Err(NeatError::InvalidIndex { index: 17, .. })
        ));

        // re-adding works once removed
        assert!(genome.add_connection(0, 2, None, &mut rng));
    }

    #[test]
    fn test_set_weight_and_bias() {
        let mut rng = test_rng();
        let mut genome = chain_genome(Activation::ReLU, &mut rng);

        genome.set_weight(0, 2, 3.0).unwrap();
        assert_eq!(genome.connection(0, 2), Some(ConnectionGene::new(3.0, 1.0)));
        genome.set_bias(0, 2, -4.0).unwrap();
        assert_eq!(genome.connection(0, 2), Some(ConnectionGene::new(3.0, -4.0)));

        assert_eq!(
            genome.set_weight(0, 1, 1.0),
            Err(NeatError::EdgeNotFound { from: 0, to: 1 })
        );
        assert_eq!(
            genome.set_bias(5, 1, 1.0),
            Err(NeatError::EdgeNotFound { from: 5, to: 1 })
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(GenomeConfig::default().validate().is_ok());

        let bad = GenomeConfig {
            perturb_prob: 1.5,
            ..GenomeConfig::default()
        };
        assert!(matches!(bad.validate(), Err(NeatError::InvalidConfig(_))));

        let bad = GenomeConfig {
            weight_init: WeightInit::Uniform {
                low: 1.0,
                high: -1.0,
            },
            ..GenomeConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_standard_normal_init() {
        let mut rng = test_rng();
        let config = GenomeConfig {
            weight_init: WeightInit::StandardNormal,
            ..GenomeConfig::new(8, 8)
        };
        let genome = Genome::init(config, &mut rng).unwrap();

        let weights: Vec<f64> = genome.connections().map(|(_, _, g)| g.weight).collect();
        assert_eq!(weights.len(), 64);
        assert!(weights.iter().all(|w| w.is_finite()));
        assert!(weights.iter().any(|w| w.abs() > 1.0));
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let mut rng = test_rng();
        let config = GenomeConfig {
            weight_init: WeightInit::Uniform {
                low: f64::NEG_INFINITY,
                high: 0.0,
            },
            ..GenomeConfig::new(2, 1)
        };
        assert!(matches!(
            Genome::init(config, &mut rng),
            Err(NeatError::InvalidConfig(_))
        ));

        let unbounded = WeightInit::Uniform {
            low: f64::NEG_INFINITY,
            high: 0.0,
        };
        assert_eq!(unbounded.sample(&mut rng), 0.0);
        let empty = WeightInit::Uniform { low: 0.5, high: 0.5 };
        assert_eq!(empty.sample(&mut rng), 0.5);
    }

    #[test]
    fn test_deserialize_checks_layout() {
        let mut rng = test_rng();
        let genome = Genome::init(GenomeConfig::new(2, 1), &mut rng).unwrap();
        let json = serde_json::to_string(&genome).unwrap();

        let restored: Genome = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.graph(), genome.graph());

        let tampered = json.replace("\"input_count\":2", "\"input_count\":5");
        assert_ne!(tampered, json);
        assert!(serde_json::from_str::<Genome>(&tampered).is_err());

        let mut missing = genome.clone();
        missing.nodes[0].connections.remove(&2);
        let json = serde_json::to_string(&missing).unwrap();
        let err = serde_json::from_str::<Genome>(&json).unwrap_err();
        assert!(err.to_string().contains("connection parameters"));

        let mut relabeled = genome.clone();
        relabeled.nodes[2].role = NodeRole::Hidden;
        let json = serde_json::to_string(&relabeled).unwrap();
        assert!(serde_json::from_str::<Genome>(&json).is_err());
    }

    #[test]
    fn test_remove_connection_keeps_edge_without_parameters() {
        let mut rng = test_rng();
        let mut genome = Genome::init(GenomeConfig::new(1, 1), &mut rng).unwrap();
        genome.nodes[0].connections.remove(&1);

        assert_eq!(
            genome.remove_connection(0, 1),
            Err(NeatError::EdgeNotFound { from: 0, to: 1 })
        );
        assert!(genome.graph().is_parent(0, 1));
    }

    #[test]
    fn test_split_refuses_mislabeled_source() {
        let mut rng = test_rng();
        let mut genome = Genome::init(GenomeConfig::new(1, 1), &mut rng).unwrap();
        genome.nodes[0].role = NodeRole::Output;

        assert!(matches!(
            genome.split_connection(0, 1, &mut rng),
            Err(NeatError::Inconsistent(_))
        ));
        assert_eq!(genome.num_nodes(), 2);
        assert!(genome.has_connection(0, 1));
        assert!(genome.connection(0, 1).is_some());
    }
}
