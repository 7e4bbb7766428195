//! Error handling for problem construction.

use thiserror::Error;

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;

/// Errors raised while building or validating problem inputs.
#[derive(Error, Debug)]
pub enum IrError {
    /// An edge references a vertex outside `0..num_vertices`.
    #[error("edge ({0}, {1}) references a vertex outside the graph")]
    EdgeOutOfRange(usize, usize),

    /// A vertex depends on itself.
    #[error("self loop on vertex {0}")]
    SelfLoop(usize),

    /// The dependency graph contains a cycle.
    #[error("workload graph contains a cycle")]
    CyclicGraph,

    /// The graph has no vertices.
    #[error("workload graph is empty")]
    EmptyGraph,

    /// A configuration field is out of its valid domain.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A backend descriptor field is out of its valid domain.
    #[error("invalid backend '{id}': {detail}")]
    InvalidBackend { id: String, detail: String },

    /// JSON (de)serialization error for problem files.
    #[error("problem format error: {0}")]
    Format(#[from] serde_json::Error),
}
