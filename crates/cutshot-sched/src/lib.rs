//! MILP-based optimizer for circuit-cutting workloads.
//!
//! Splits a weighted workload DAG into capacity-bounded subcircuits
//! (minimizing wire cuts), then selects backends and divides each
//! subcircuit's shot budget among them under one of four objective modes.
//! Models are built with `good_lp` and solved by its pure-Rust `microlp`
//! backend in a single blocking call per model.
//!
//! Entry points: [`partition`] for the cutter alone, [`allocate`] for the
//! scheduler alone, and [`CutShotPlanner`] / [`solve_problem`] for the
//! combined pipeline.

pub mod allocate;
pub mod error;
mod model;
pub mod partition;
pub mod plan;
pub mod planner;
pub mod postcost;

pub use allocate::allocate;
pub use error::{ConstraintFamily, PlanError, PlanResult};
pub use partition::partition;
pub use plan::{
    AllocationPlan, BackendUsage, CutEdge, CutShotPlan, PartitionPlan, ShotAllocation,
    SolveStatus, SubcircuitAggregates, SubcircuitPlan,
};
pub use planner::{CutShotPlanner, SweepCandidate, SweepReport, solve_problem};
pub use postcost::{Linear, PowerLaw, ReconstructionCost};
