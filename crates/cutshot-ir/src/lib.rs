//! Cutshot problem representation.
//!
//! This crate holds the immutable inputs of a cut-and-shoot scheduling run:
//!
//! - [`WorkloadGraph`]: the circuit's dependency DAG with per-vertex qubit
//!   weights, produced by an external graph-extraction step.
//! - [`BackendDescriptor`]: a QPU with queue/execution-time estimates,
//!   capacity, and optional price/reliability/region metadata.
//! - [`PlannerConfig`]: the knobs of one optimization run (subcircuit count
//!   and capacity, shot budget, objective mode, QoS weights, predicates).
//! - [`Problem`]: the single-document JSON format bundling all of the above.
//!
//! Everything here is constructed once per run and never mutated afterwards;
//! the optimizer in `cutshot-sched` only reads these types.

pub mod backend;
pub mod config;
pub mod error;
pub mod graph;
pub mod problem;

pub use backend::BackendDescriptor;
pub use config::{BackendPredicate, ObjectiveMode, PlannerConfig, QosWeights};
pub use error::{IrError, IrResult};
pub use graph::WorkloadGraph;
pub use problem::Problem;
