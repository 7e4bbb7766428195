//! Workload graph: the circuit's dependency DAG.
//!
//! Vertices are atomic work units (gates) carrying a non-negative integer
//! weight (the number of qubits the gate touches); edges are data
//! dependencies. The graph is validated on construction and immutable
//! afterwards.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{IrError, IrResult};

/// A validated directed acyclic workload graph.
///
/// Vertex ids are dense (`0..num_vertices`); edges are `(source, target)`
/// pairs over those ids.
#[derive(Debug, Clone)]
pub struct WorkloadGraph {
    weights: Vec<u32>,
    edges: Vec<(usize, usize)>,
}

impl WorkloadGraph {
    /// Build a workload graph from per-vertex weights and dependency edges.
    ///
    /// Rejects empty graphs, out-of-range endpoints, self loops, and cycles.
    pub fn new(weights: Vec<u32>, edges: Vec<(usize, usize)>) -> IrResult<Self> {
        if weights.is_empty() {
            return Err(IrError::EmptyGraph);
        }

        let n = weights.len();
        for &(u, v) in &edges {
            if u >= n || v >= n {
                return Err(IrError::EdgeOutOfRange(u, v));
            }
            if u == v {
                return Err(IrError::SelfLoop(u));
            }
        }

        let graph = Self { weights, edges };
        if is_cyclic_directed(&graph.to_dag()) {
            return Err(IrError::CyclicGraph);
        }
        Ok(graph)
    }

    /// A path graph `0 -> 1 -> ... -> n-1` with unit weights.
    ///
    /// Used by tests and fixtures; a path is the smallest workload with
    /// non-trivial cut structure.
    pub fn path(n: usize) -> IrResult<Self> {
        let edges = (1..n).map(|v| (v - 1, v)).collect();
        Self::new(vec![1; n], edges)
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.weights.len()
    }

    /// Number of dependency edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Weight (qubits touched) of vertex `v`.
    pub fn weight(&self, v: usize) -> u32 {
        self.weights[v]
    }

    /// All vertex weights, indexed by vertex id.
    pub fn weights(&self) -> &[u32] {
        &self.weights
    }

    /// Dependency edges as `(source, target)` pairs.
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Sum of all vertex weights.
    pub fn total_weight(&self) -> u64 {
        self.weights.iter().map(|&w| u64::from(w)).sum()
    }

    /// Largest single vertex weight.
    pub fn max_weight(&self) -> u32 {
        self.weights.iter().copied().max().unwrap_or(0)
    }

    /// Materialize the petgraph view of this workload.
    pub fn to_dag(&self) -> DiGraph<u32, ()> {
        let mut dag = DiGraph::with_capacity(self.weights.len(), self.edges.len());
        let nodes: Vec<NodeIndex> = self.weights.iter().map(|&w| dag.add_node(w)).collect();
        for &(u, v) in &self.edges {
            dag.add_edge(nodes[u], nodes[v], ());
        }
        dag
    }
}
