//! Sweep command implementation.

use anyhow::Result;
use console::style;

use cutshot_sched::{CutShotPlanner, PowerLaw};

use super::common::{emit, load_problem};

/// Execute the sweep command.
pub fn execute(input: &str, max: usize, channels_per_cut: f64, output: Option<&str>) -> Result<()> {
    if max == 0 {
        anyhow::bail!("sweep needs at least one subcircuit count to try");
    }

    let problem = load_problem(input)?;
    let graph = problem.workload_graph()?;
    let planner = CutShotPlanner::new(&graph, &problem.backends, problem.config.clone())?;
    let report = planner.plan_sweep(1..=max, &PowerLaw::new(channels_per_cut))?;

    eprintln!(
        "{} {} subcircuits win out of {} feasible candidates",
        style("Sweep:").green().bold(),
        report.best_num_subcircuits,
        report.candidates.len(),
    );
    for candidate in &report.candidates {
        eprintln!(
            "  {} subcircuits: {} cuts, objective {:.6}, reconstruction {:.1}, score {:.3}",
            candidate.num_subcircuits,
            candidate.cut_count,
            candidate.objective,
            candidate.reconstruction_cost,
            candidate.score,
        );
    }

    emit(&report.best.to_json()?, output)
}
