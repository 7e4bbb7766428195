//! Error handling for the optimizer.

use std::fmt;

use thiserror::Error;

/// Result type for planner operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// The constraint family most likely responsible for an infeasibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintFamily {
    /// Subcircuit or backend capacity bounds.
    Capacity,
    /// Hard backend-exclusion predicates.
    Predicate,
    /// Shot-budget conservation.
    ShotBudget,
    /// Partition structure (assignment / cut consistency / ordering).
    Structure,
}

impl fmt::Display for ConstraintFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Capacity => "capacity",
            Self::Predicate => "predicate",
            Self::ShotBudget => "shot-budget",
            Self::Structure => "structure",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during an optimization run.
#[derive(Error, Debug)]
pub enum PlanError {
    /// Inputs rejected before any model was built.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No assignment satisfies the constraints. Never downgraded to a
    /// default plan.
    #[error("infeasible ({family} constraints): {detail}")]
    Infeasible {
        family: ConstraintFamily,
        detail: String,
    },

    /// The time limit expired before any feasible solution was found.
    /// When an incumbent exists it is returned instead, tagged sub-optimal.
    #[error("time limit reached with no feasible solution: {0}")]
    SolverLimit(String),

    /// The underlying solver failed or returned an unrecognized status.
    #[error("solver failure: {0}")]
    SolverFailure(String),
}

impl From<cutshot_ir::IrError> for PlanError {
    fn from(e: cutshot_ir::IrError) -> Self {
        PlanError::InvalidInput(e.to_string())
    }
}
