//! Append-only directed acyclic graph over dense node indices.
//!
//! Nodes are identified by their creation order (`0..node_count`) and are
//! never removed. Each node stores its outgoing adjacency list and the number
//! of edges terminating at it, which is all Kahn's algorithm needs to derive
//! a topological layering.
//!
//! ## Acyclicity
//!
//! Every successful mutation leaves the graph acyclic. [`Graph::try_add_edge`]
//! screens the edge with cheap reachability checks, then applies it
//! speculatively and runs a whole-graph cycle check, rolling back if one is
//! found. Because it holds `&mut self` for the whole sequence, no caller can
//! observe the transient state.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{NeatError, Result};

/// DFS colouring for cycle detection.
const WHITE: u8 = 0;
const GREY: u8 = 1;
const BLACK: u8 = 2;

/// Structural node: adjacency only, no semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Node {
    /// Destinations of edges leaving this node. Order is not meaningful.
    outgoing: Vec<usize>,
    /// Number of edges terminating at this node.
    incoming: usize,
}

/// A growable DAG with cycle-safe edge insertion.
///
/// Deserialization rejects dangling or duplicate edges, stale incoming
/// counts and cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGraph")]
pub struct Graph {
    nodes: Vec<Node>,
}

/// Unchecked serialized form of [`Graph`].
#[derive(Deserialize)]
struct RawGraph {
    nodes: Vec<Node>,
}

impl TryFrom<RawGraph> for Graph {
    type Error = NeatError;

    fn try_from(raw: RawGraph) -> Result<Self> {
        let graph = Self { nodes: raw.nodes };
        let count = graph.nodes.len();

        let mut incoming = vec![0usize; count];
        for (from, node) in graph.nodes.iter().enumerate() {
            for (pos, &to) in node.outgoing.iter().enumerate() {
                if to >= count {
                    return Err(NeatError::Inconsistent(format!(
                        "edge {from} -> {to} points past {count} nodes"
                    )));
                }
                if node.outgoing[..pos].contains(&to) {
                    return Err(NeatError::Inconsistent(format!(
                        "edge {from} -> {to} listed twice"
                    )));
                }
                incoming[to] += 1;
            }
        }

        for (index, (node, &expected)) in graph.nodes.iter().zip(&incoming).enumerate() {
            if node.incoming != expected {
                return Err(NeatError::Inconsistent(format!(
                    "node {index} records {} incoming edges, found {expected}",
                    node.incoming
                )));
            }
        }

        if graph.has_cycle() {
            return Err(NeatError::Inconsistent("graph contains a cycle".into()));
        }
        Ok(graph)
    }
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph with room for `capacity` nodes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Append a node with no edges and return its index.
    pub fn add_node(&mut self) -> usize {
        self.nodes.push(Node::default());
        self.nodes.len() - 1
    }

    /// Number of nodes.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.outgoing.len()).sum()
    }

    /// Whether `index` refers to an existing node.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, index: usize) -> bool {
        index < self.nodes.len()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if self.is_valid(index) {
            Ok(())
        } else {
            Err(NeatError::InvalidIndex {
                index,
                node_count: self.nodes.len(),
            })
        }
    }

    /// Destinations of the edges leaving `index`; empty for unknown nodes.
    #[inline]
    #[must_use]
    pub fn outgoing(&self, index: usize) -> &[usize] {
        self.nodes.get(index).map_or(&[], |n| n.outgoing.as_slice())
    }

    /// Number of edges terminating at `index`; zero for unknown nodes.
    #[inline]
    #[must_use]
    pub fn incoming_count(&self, index: usize) -> usize {
        self.nodes.get(index).map_or(0, |n| n.incoming)
    }

    /// Iterate over all edges as `(from, to)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .flat_map(|(from, n)| n.outgoing.iter().map(move |&to| (from, to)))
    }

    /// Add the edge `from -> to`, reporting why it was refused.
    ///
    /// # Errors
    ///
    /// - [`NeatError::InvalidIndex`] if either endpoint does not exist
    /// - [`NeatError::DuplicateEdge`] if the edge is already present
    /// - [`NeatError::CycleRejected`] for self-loops and edges that would close a cycle
    ///
    /// The graph is unchanged on every error path.
    pub fn try_add_edge(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;

        if from == to || self.is_ancestor(to, from) {
            return Err(NeatError::CycleRejected { from, to });
        }
        if self.is_parent(from, to) {
            return Err(NeatError::DuplicateEdge { from, to });
        }

        self.nodes[from].outgoing.push(to);
        self.nodes[to].incoming += 1;

        if self.has_cycle() {
            self.nodes[from].outgoing.pop();
            self.nodes[to].incoming -= 1;
            return Err(NeatError::CycleRejected { from, to });
        }

        Ok(())
    }

    /// Add the edge `from -> to`.
    ///
    /// Returns `false`, leaving the graph untouched, if either index is out of
    /// range, the edge exists, or it would create a cycle.
    pub fn add_edge(&mut self, from: usize, to: usize) -> bool {
        match self.try_add_edge(from, to) {
            Ok(()) => true,
            Err(err) => {
                trace!(from, to, %err, "edge refused");
                false
            }
        }
    }

    /// Remove the edge `from -> to` if present.
    ///
    /// The order of `from`'s outgoing list is not preserved. Returns whether
    /// an edge was removed.
    ///
    /// # Errors
    ///
    /// Returns [`NeatError::InvalidIndex`] if either endpoint does not exist.
    pub fn remove_edge(&mut self, from: usize, to: usize) -> Result<bool> {
        self.check_index(from)?;
        self.check_index(to)?;

        let outgoing = &mut self.nodes[from].outgoing;
        let Some(pos) = outgoing.iter().position(|&v| v == to) else {
            return Ok(false);
        };
        outgoing.swap_remove(pos);
        self.nodes[to].incoming -= 1;
        Ok(true)
    }

    /// Whether the direct edge `parent -> child` exists.
    #[must_use]
    pub fn is_parent(&self, parent: usize, child: usize) -> bool {
        self.is_valid(child) && self.outgoing(parent).contains(&child)
    }

    /// Whether `descendant` is reachable from `ancestor` by a path of one or more edges.
    ///
    /// Tracks visited nodes, so it terminates even on a cyclic graph.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: usize, descendant: usize) -> bool {
        if !self.is_valid(ancestor) || !self.is_valid(descendant) {
            return false;
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![ancestor];
        visited[ancestor] = true;

        while let Some(current) = stack.pop() {
            for &succ in &self.nodes[current].outgoing {
                if succ == descendant {
                    return true;
                }
                if !visited[succ] {
                    visited[succ] = true;
                    stack.push(succ);
                }
            }
        }

        false
    }

    /// Whole-graph cycle detection by iterative depth-first search. O(V+E).
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        let mut color = vec![WHITE; self.nodes.len()];
        // (node, offset of the next outgoing edge to explore)
        let mut stack: Vec<(usize, usize)> = Vec::with_capacity(self.nodes.len());

        for start in 0..self.nodes.len() {
            if color[start] != WHITE {
                continue;
            }
            color[start] = GREY;
            stack.push((start, 0));

            while let Some(top) = stack.last_mut() {
                let (node, offset) = *top;
                if let Some(&succ) = self.nodes[node].outgoing.get(offset) {
                    top.1 += 1;
                    match color[succ] {
                        GREY => return true,
                        WHITE => {
                            color[succ] = GREY;
                            stack.push((succ, 0));
                        }
                        _ => {}
                    }
                } else {
                    color[node] = BLACK;
                    stack.pop();
                }
            }
        }

        false
    }

    /// Compute the topological layer of every node (Kahn's algorithm, longest path).
    ///
    /// Sources get depth 0; every other node gets one more than its deepest
    /// predecessor. Nodes that never become ready (only possible on a cyclic
    /// graph) are assigned the number of nodes that were processed, so callers
    /// sorting by depth still terminate.
    #[must_use]
    pub fn compute_depths(&self) -> Vec<usize> {
        let count = self.nodes.len();
        let mut remaining: Vec<usize> = self.nodes.iter().map(|n| n.incoming).collect();
        let mut depths = vec![0usize; count];
        let mut frontier: Vec<usize> = (0..count).filter(|&i| remaining[i] == 0).collect();

        let mut processed = 0;
        while let Some(node) = frontier.pop() {
            processed += 1;
            let next = depths[node] + 1;
            for &succ in &self.nodes[node].outgoing {
                depths[succ] = depths[succ].max(next);
                remaining[succ] = remaining[succ].saturating_sub(1);
                if remaining[succ] == 0 {
                    frontier.push(succ);
                }
            }
        }

        if processed < count {
            for (depth, &left) in depths.iter_mut().zip(&remaining) {
                if left > 0 {
                    *depth = processed;
                }
            }
        }

        depths
    }

    /// All node indices ordered by ascending depth, ties broken by index.
    ///
    /// For every edge `u -> v`, `u` precedes `v`. Recomputed on every call.
    #[must_use]
    pub fn topological_order(&self) -> Vec<usize> {
        let depths = self.compute_depths();
        let mut order: Vec<usize> = (0..self.nodes.len()).collect();
        order.sort_by_key(|&i| (depths[i], i));
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn graph_with_nodes(n: usize) -> Graph {
        let mut graph = Graph::new();
        for _ in 0..n {
            graph.add_node();
        }
        graph
    }

    fn assert_order_respects_edges(graph: &Graph) {
        let order = graph.topological_order();
        let mut position = vec![usize::MAX; graph.node_count()];
        for (pos, &node) in order.iter().enumerate() {
            assert_eq!(position[node], usize::MAX, "node {node} appears twice");
            position[node] = pos;
        }
        assert!(position.iter().all(|&p| p != usize::MAX));
        for (from, to) in graph.edges() {
            assert!(
                position[from] < position[to],
                "edge {from} -> {to} out of order"
            );
        }
    }

    #[test]
    fn test_add_node_returns_dense_indices() {
        let mut graph = Graph::new();
        assert_eq!(graph.add_node(), 0);
        assert_eq!(graph.add_node(), 1);
        assert_eq!(graph.add_node(), 2);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.incoming_count(2), 0);
    }

    #[test]
    fn test_add_edge_basic() {
        let mut graph = graph_with_nodes(3);
        assert!(graph.add_edge(0, 1));
        assert!(graph.add_edge(1, 2));

        assert!(graph.is_parent(0, 1));
        assert!(!graph.is_parent(0, 2));
        assert!(graph.is_ancestor(0, 2));
        assert!(!graph.is_ancestor(2, 0));
        assert_eq!(graph.incoming_count(2), 1);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_reverse_edge_rejected() {
        let mut graph = graph_with_nodes(2);
        assert!(graph.add_edge(0, 1));
        assert!(!graph.add_edge(1, 0));
        assert_eq!(
            graph.try_add_edge(1, 0),
            Err(NeatError::CycleRejected { from: 1, to: 0 })
        );
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.incoming_count(0), 0);
    }

    #[test]
    fn test_long_cycle_rejected() {
        let mut graph = graph_with_nodes(4);
        assert!(graph.add_edge(0, 1));
        assert!(graph.add_edge(1, 2));
        assert!(graph.add_edge(2, 3));
        assert!(!graph.add_edge(3, 0));
        assert!(!graph.has_cycle());
        // Skip connections along the existing direction are fine.
        assert!(graph.add_edge(0, 3));
    }

    #[test]
    fn test_self_loop_and_duplicate_rejected() {
        let mut graph = graph_with_nodes(2);
        assert_eq!(
            graph.try_add_edge(1, 1),
            Err(NeatError::CycleRejected { from: 1, to: 1 })
        );
        assert!(graph.add_edge(0, 1));
        assert_eq!(
            graph.try_add_edge(0, 1),
            Err(NeatError::DuplicateEdge { from: 0, to: 1 })
        );
        assert_eq!(graph.incoming_count(1), 1);
    }

    #[test]
    fn test_invalid_indices() {
        let mut graph = graph_with_nodes(2);
        assert!(!graph.add_edge(0, 5));
        assert_eq!(
            graph.try_add_edge(7, 0),
            Err(NeatError::InvalidIndex {
                index: 7,
                node_count: 2
            })
        );
        assert!(graph.remove_edge(0, 9).is_err());
        assert!(!graph.is_ancestor(0, 9));
        assert!(!graph.is_parent(9, 0));
        assert!(graph.outgoing(9).is_empty());
    }

    #[test]
    fn test_remove_edge() {
        let mut graph = graph_with_nodes(4);
        assert!(graph.add_edge(0, 1));
        assert!(graph.add_edge(0, 2));
        assert!(graph.add_edge(0, 3));

        assert_eq!(graph.remove_edge(0, 1), Ok(true));
        assert_eq!(graph.remove_edge(0, 1), Ok(false));
        assert!(!graph.is_parent(0, 1));
        assert!(graph.is_parent(0, 2));
        assert!(graph.is_parent(0, 3));
        assert_eq!(graph.incoming_count(1), 0);
        assert_eq!(graph.outgoing(0).len(), 2);

        // The reverse direction becomes legal once the edge is gone.
        assert!(graph.add_edge(1, 0));
    }

    #[test]
    fn test_compute_depths_longest_path() {
        // 0 -> 1 -> 2 -> 3 and a shortcut 0 -> 3
        let mut graph = graph_with_nodes(5);
        assert!(graph.add_edge(0, 3));
        assert!(graph.add_edge(0, 1));
        assert!(graph.add_edge(1, 2));
        assert!(graph.add_edge(2, 3));

        let depths = graph.compute_depths();
        assert_eq!(depths, vec![0, 1, 2, 3, 0]);
        assert_eq!(graph.topological_order(), vec![0, 4, 1, 2, 3]);
    }

    #[test]
    fn test_topological_order_ties_broken_by_index() {
        let mut graph = graph_with_nodes(4);
        assert!(graph.add_edge(3, 0));
        assert_eq!(graph.topological_order(), vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_random_insertions_stay_acyclic() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut graph = graph_with_nodes(12);
        let mut accepted = 0;

        for _ in 0..300 {
            let from = rng.random_range(0..graph.node_count());
            let to = rng.random_range(0..graph.node_count());
            if graph.add_edge(from, to) {
                accepted += 1;
                assert!(!graph.has_cycle());
            }
            if rng.random::<f64>() < 0.05 {
                graph.add_node();
            }
        }

        assert!(accepted > 0);
        assert_eq!(graph.edge_count(), accepted);
        let incoming_total: usize = (0..graph.node_count())
            .map(|i| graph.incoming_count(i))
            .sum();
        assert_eq!(incoming_total, accepted);
        assert_order_respects_edges(&graph);
    }

    #[test]
    fn test_cycle_detection_on_corrupted_graph() {
        let mut graph = graph_with_nodes(3);
        assert!(graph.add_edge(0, 1));
        assert!(graph.add_edge(1, 2));
        assert!(!graph.has_cycle());

        // Bypass the guards to build 1 -> 2 -> 1.
        graph.nodes[2].outgoing.push(1);
        graph.nodes[1].incoming += 1;
        assert!(graph.has_cycle());

        // Reachability queries terminate on the cycle.
        assert!(graph.is_ancestor(1, 1));
        assert!(!graph.is_ancestor(2, 0));

        // Nodes stuck on the cycle are parked after everything processed.
        let depths = graph.compute_depths();
        assert_eq!(depths[0], 0);
        assert_eq!(depths[1], 1);
        assert_eq!(depths[2], 1);
        assert_eq!(graph.topological_order().len(), 3);
    }

    #[test]
    fn test_deserialize_roundtrip() {
        let mut graph = graph_with_nodes(3);
        assert!(graph.add_edge(0, 1));
        assert!(graph.add_edge(0, 2));

        let json = serde_json::to_string(&graph).unwrap();
        let restored: Graph = serde_json::from_str(&json).unwrap();
        assert_eq!(graph, restored);
    }

    #[test]
    fn test_deserialize_rejects_bad_structure() {
        let dangling = r#"{"nodes":[{"outgoing":[5],"incoming":0}]}"#;
        assert!(serde_json::from_str::<Graph>(dangling).is_err());

        let duplicate =
            r#"{"nodes":[{"outgoing":[1,1],"incoming":0},{"outgoing":[],"incoming":2}]}"#;
        assert!(serde_json::from_str::<Graph>(duplicate).is_err());

        let stale_count =
            r#"{"nodes":[{"outgoing":[1],"incoming":0},{"outgoing":[],"incoming":0}]}"#;
        assert!(serde_json::from_str::<Graph>(stale_count).is_err());

        let cyclic =
            r#"{"nodes":[{"outgoing":[1],"incoming":1},{"outgoing":[0],"incoming":1}]}"#;
        let err = serde_json::from_str::<Graph>(cyclic).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }
}
