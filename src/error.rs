//! Error taxonomy for graph and genome operations.
//!
//! Two kinds of failure share this enum. [`NeatError::CycleRejected`] and
//! [`NeatError::DuplicateEdge`] are ordinary "edge refused" outcomes that the
//! mutation operators swallow. Everything else signals a caller or internal
//! consistency bug and aborts the operation before anything is committed.

use thiserror::Error;

use crate::gene::NodeRole;

/// Errors produced by [`Graph`](crate::Graph), [`Genome`](crate::Genome) and
/// [`Population`](crate::Population).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NeatError {
    /// A node reference outside `[0, node_count)`.
    #[error("node index {index} out of range for graph with {node_count} nodes")]
    InvalidIndex {
        /// The offending index.
        index: usize,
        /// Number of nodes in the graph at the time of the call.
        node_count: usize,
    },

    /// The edge would close a cycle (including self-loops).
    #[error("edge {from} -> {to} would create a cycle")]
    CycleRejected {
        /// Source node.
        from: usize,
        /// Destination node.
        to: usize,
    },

    /// The edge is already present.
    #[error("edge {from} -> {to} already exists")]
    DuplicateEdge {
        /// Source node.
        from: usize,
        /// Destination node.
        to: usize,
    },

    /// The connection does not exist.
    #[error("no connection {from} -> {to}")]
    EdgeNotFound {
        /// Source node.
        from: usize,
        /// Destination node.
        to: usize,
    },

    /// `forward` was called with the wrong number of inputs.
    #[error("input size mismatch: expected {expected}, got {actual}")]
    InputSizeMismatch {
        /// Number of input nodes in the genome.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },

    /// Adding a node of this role would break the input/output/hidden index layout.
    #[error("cannot add {role:?} node after nodes of a later role")]
    RoleOutOfOrder {
        /// The role that was requested.
        role: NodeRole,
    },

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Structure and metadata disagree, e.g. in deserialized data.
    #[error("inconsistent structure: {0}")]
    Inconsistent(String),
}

impl NeatError {
    /// Whether this error is a normal "mutation refused" outcome rather than a bug.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::CycleRejected { .. } | Self::DuplicateEdge { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NeatError>;
