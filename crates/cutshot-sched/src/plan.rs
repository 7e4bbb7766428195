//! Optimizer outputs: partition plans, shot allocations, combined plans.
//!
//! These are solver results computed once per run and never mutated
//! afterwards; a new run produces a new, independent plan.

use serde::{Deserialize, Serialize};

use crate::error::{ConstraintFamily, PlanError, PlanResult};

/// Terminal quality of a returned plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Proven optimal for the configured objective.
    Optimal,
    /// Best incumbent when the time budget expired before all candidates
    /// were explored.
    SubOptimal,
}

/// Per-subcircuit qubit accounting.
///
/// `total_qubits` is what the subcircuit needs from a backend;
/// `contributing_qubits` is what it contributes to the final observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcircuitAggregates {
    /// Qubits owned by the subcircuit's own vertices (`a`).
    pub input_qubits: u32,
    /// Qubits introduced purely to receive an incoming cut (`p`).
    pub init_qubits: u32,
    /// Qubits measured out at an outgoing cut (`o`).
    pub measured_qubits: u32,
    /// Qubits contributing to the final output (`f = a + p - o`).
    pub contributing_qubits: u32,
    /// Qubits the subcircuit occupies on a backend (`d = a + p`).
    pub total_qubits: u32,
}

impl SubcircuitAggregates {
    /// Whether the defining identities hold exactly.
    pub fn consistent(&self) -> bool {
        self.contributing_qubits
            == self.input_qubits + self.init_qubits - self.measured_qubits
            && self.total_qubits == self.input_qubits + self.init_qubits
    }
}

/// One subcircuit of a partition plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubcircuitPlan {
    /// Subcircuit index.
    pub index: usize,
    /// Vertices assigned to this subcircuit, ascending.
    pub vertices: Vec<usize>,
    /// Qubit accounting for this subcircuit.
    pub aggregates: SubcircuitAggregates,
    /// Vertices inside this subcircuit receiving a cut edge (cut "in").
    pub cuts_in: Vec<usize>,
    /// Vertices inside this subcircuit feeding a cut edge (cut "out").
    pub cuts_out: Vec<usize>,
}

impl SubcircuitPlan {
    /// Whether the subcircuit received no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// A `(edge, subcircuit)` cut marker.
///
/// Each physical cut appears twice: once for the subcircuit containing the
/// edge's source and once for the one containing its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutEdge {
    /// Edge source vertex.
    pub source: usize,
    /// Edge target vertex.
    pub target: usize,
    /// Subcircuit the edge crosses into or out of.
    pub subcircuit: usize,
}

/// Output of the graph partitioner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionPlan {
    /// Vertex-to-subcircuit assignment, indexed by vertex id.
    pub assignment: Vec<usize>,
    /// All subcircuits (possibly fewer non-empty ones than configured).
    pub subcircuits: Vec<SubcircuitPlan>,
    /// Cut markers per `(edge, subcircuit)` pair.
    pub cut_edges: Vec<CutEdge>,
    /// Number of physical cuts (each marker pair counted once).
    pub cut_count: u32,
    /// Objective value reached by the solver.
    pub objective: f64,
    /// Terminal quality.
    pub status: SolveStatus,
}

impl PartitionPlan {
    /// Subcircuits that received at least one vertex.
    pub fn non_empty(&self) -> impl Iterator<Item = &SubcircuitPlan> {
        self.subcircuits.iter().filter(|s| !s.is_empty())
    }

    /// Check structural invariants against the capacity bound.
    ///
    /// Verifies: every vertex assigned exactly once, aggregate identities,
    /// and `total_qubits <= capacity` per subcircuit.
    pub fn validate(&self, capacity: u32) -> PlanResult<()> {
        let mut seen = vec![false; self.assignment.len()];
        for subcircuit in &self.subcircuits {
            for &v in &subcircuit.vertices {
                if v >= seen.len() || seen[v] {
                    return Err(PlanError::Infeasible {
                        family: ConstraintFamily::Structure,
                        detail: format!("vertex {v} not assigned exactly once"),
                    });
                }
                seen[v] = true;
            }
            if !subcircuit.aggregates.consistent() {
                return Err(PlanError::Infeasible {
                    family: ConstraintFamily::Structure,
                    detail: format!(
                        "aggregate identities violated in subcircuit {}",
                        subcircuit.index
                    ),
                });
            }
            if subcircuit.aggregates.total_qubits > capacity {
                return Err(PlanError::Infeasible {
                    family: ConstraintFamily::Capacity,
                    detail: format!(
                        "subcircuit {} needs {} qubits, capacity is {capacity}",
                        subcircuit.index, subcircuit.aggregates.total_qubits
                    ),
                });
            }
        }
        if !seen.iter().all(|&s| s) {
            return Err(PlanError::Infeasible {
                family: ConstraintFamily::Structure,
                detail: "unassigned vertex".into(),
            });
        }
        Ok(())
    }
}

/// Shots given to one backend for one subcircuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotAllocation {
    /// Backend receiving the shots.
    pub backend_id: String,
    /// Strictly positive shot count.
    pub shots: u64,
}

/// Busy-time summary for one backend across all subcircuits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendUsage {
    /// Backend id.
    pub backend_id: String,
    /// Queue plus execution time attributed to this backend, in seconds.
    pub busy_time: f64,
    /// Total shots routed to this backend.
    pub total_shots: u64,
}

/// Output of the backend selector & shot allocator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// Per-subcircuit allocations, indexed like the subcircuit list that was
    /// scheduled. Empty subcircuits receive no allocations.
    pub allocations: Vec<Vec<ShotAllocation>>,
    /// Per-backend usage, only for backends that received shots.
    pub usage: Vec<BackendUsage>,
    /// Worst per-backend completion time, in seconds.
    pub makespan: f64,
    /// Objective value reached by the solver.
    pub objective: f64,
    /// Terminal quality.
    pub status: SolveStatus,
}

impl AllocationPlan {
    /// Check shot conservation: every scheduled subcircuit's allocations sum
    /// to the budget and every listed allocation is strictly positive.
    pub fn validate(&self, shots_per_subcircuit: u64) -> PlanResult<()> {
        for (c, allocations) in self.allocations.iter().enumerate() {
            if allocations.is_empty() {
                continue; // empty subcircuit, nothing scheduled
            }
            let mut total = 0u64;
            for allocation in allocations {
                if allocation.shots == 0 {
                    return Err(PlanError::Infeasible {
                        family: ConstraintFamily::ShotBudget,
                        detail: format!(
                            "zero-shot allocation listed for subcircuit {c} on {}",
                            allocation.backend_id
                        ),
                    });
                }
                total += allocation.shots;
            }
            if total != shots_per_subcircuit {
                return Err(PlanError::Infeasible {
                    family: ConstraintFamily::ShotBudget,
                    detail: format!(
                        "subcircuit {c} received {total} shots, budget is {shots_per_subcircuit}"
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Combined output of one full optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutShotPlan {
    /// The partitioning decision.
    pub partition: PartitionPlan,
    /// The backend selection and shot split.
    pub allocation: AllocationPlan,
    /// Composed objective value for the configured mode.
    pub objective: f64,
    /// Terminal quality of the whole run.
    pub status: SolveStatus,
}

impl CutShotPlan {
    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
