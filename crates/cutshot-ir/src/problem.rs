//! Single-document problem format.
//!
//! A problem file bundles the extracted workload graph, the backend
//! descriptors, and the planner configuration into one JSON document. This
//! is the wire format between the external extraction/estimation steps and
//! the optimizer.

use serde::{Deserialize, Serialize};

use crate::backend::BackendDescriptor;
use crate::config::PlannerConfig;
use crate::error::IrResult;
use crate::graph::WorkloadGraph;

/// Workload graph as it appears on the wire, prior to validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSpec {
    /// Per-vertex qubit weights, indexed by vertex id.
    pub vertex_weights: Vec<u32>,
    /// Dependency edges as `(source, target)` pairs.
    pub edges: Vec<(usize, usize)>,
}

impl From<&WorkloadGraph> for GraphSpec {
    fn from(graph: &WorkloadGraph) -> Self {
        Self {
            vertex_weights: graph.weights().to_vec(),
            edges: graph.edges().to_vec(),
        }
    }
}

/// A complete optimization problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    /// The workload to partition and schedule.
    pub graph: GraphSpec,
    /// The backend pool.
    pub backends: Vec<BackendDescriptor>,
    /// Planner knobs.
    pub config: PlannerConfig,
}

impl Problem {
    /// Parse a problem from its JSON representation.
    pub fn from_json(json: &str) -> IrResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> IrResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate and materialize the workload graph.
    pub fn workload_graph(&self) -> IrResult<WorkloadGraph> {
        WorkloadGraph::new(self.graph.vertex_weights.clone(), self.graph.edges.clone())
    }
}
