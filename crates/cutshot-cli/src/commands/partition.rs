//! Partition command implementation.

use anyhow::Result;
use console::style;

use super::common::{emit, load_problem};

/// Execute the partition command.
pub fn execute(input: &str, output: Option<&str>) -> Result<()> {
    let problem = load_problem(input)?;
    let graph = problem.workload_graph()?;
    let plan = cutshot_sched::partition(
        &graph,
        problem.config.max_qubits_per_subcircuit,
        problem.config.num_subcircuits,
    )?;

    eprintln!(
        "{} {} cuts across {} subcircuits",
        style("Partitioned:").green().bold(),
        plan.cut_count,
        plan.non_empty().count(),
    );

    emit(&serde_json::to_string_pretty(&plan)?, output)
}
