//! Gene types for genomes.
//!
//! - [`NodeGene`]: the semantic half of a node (role, activation, outgoing parameters)
//! - [`ConnectionGene`]: the numeric parameters of one directed edge
//!
//! Structure (which edges exist, in which direction) is owned by
//! [`Graph`](crate::Graph); genes only carry what the forward pass needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::activation::Activation;

/// The role of a node in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Input node - receives external values, no activation applied.
    Input,
    /// Output node - accumulates during propagation, activated afterwards.
    Output,
    /// Hidden node - internal node added by the split-connection mutation.
    Hidden,
}

/// Numeric parameters of a connection.
///
/// A contribution along `from -> to` is `activation(from)(value[from] * weight + bias)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionGene {
    /// Multiplicative weight.
    pub weight: f64,
    /// Additive bias, applied before the source activation.
    pub bias: f64,
}

impl ConnectionGene {
    /// Create a connection with the given parameters.
    #[must_use]
    pub const fn new(weight: f64, bias: f64) -> Self {
        Self { weight, bias }
    }

    /// The identity pass-through used for the first half of a split connection.
    #[must_use]
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0)
    }
}

/// Per-node metadata kept in lock-step with the graph's node indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGene {
    /// The role of this node.
    pub role: NodeRole,
    /// Activation applied to this node's outgoing contributions
    /// (and, for outputs, to the final accumulated value).
    pub activation: Activation,
    /// Outgoing connection parameters keyed by destination index.
    ///
    /// Ordered so that summation order in the forward pass does not depend
    /// on mutation history.
    pub connections: BTreeMap<usize, ConnectionGene>,
}

impl NodeGene {
    /// Create a node with no outgoing connections.
    #[must_use]
    pub fn new(role: NodeRole, activation: Activation) -> Self {
        Self {
            role,
            activation,
            connections: BTreeMap::new(),
        }
    }
}
