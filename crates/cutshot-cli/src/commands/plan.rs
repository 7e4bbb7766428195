//! Plan command implementation.

use anyhow::Result;
use console::style;

use cutshot_sched::solve_problem;

use super::common::{emit, load_problem};

/// Execute the plan command.
pub fn execute(input: &str, output: Option<&str>) -> Result<()> {
    let problem = load_problem(input)?;
    let plan = solve_problem(&problem)?;

    eprintln!(
        "{} {} cuts, makespan {:.3}s, objective {:.6}",
        style("Planned:").green().bold(),
        plan.partition.cut_count,
        plan.allocation.makespan,
        plan.objective,
    );
    for subcircuit in plan.partition.non_empty() {
        let backends: Vec<String> = plan.allocation.allocations[subcircuit.index]
            .iter()
            .map(|a| format!("{} x{}", a.backend_id, a.shots))
            .collect();
        eprintln!(
            "  subcircuit {}: {} qubits -> {}",
            subcircuit.index,
            subcircuit.aggregates.total_qubits,
            backends.join(", "),
        );
    }

    emit(&plan.to_json()?, output)
}
