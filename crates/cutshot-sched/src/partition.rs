//! Graph partitioner: split the workload DAG into capacity-bounded
//! subcircuits while minimizing the number of cut edges.
//!
//! Decision variables, per subcircuit `c`:
//! - `y[v][c]`: vertex `v` belongs to subcircuit `c`.
//! - `x[e][c]`: edge `e` is cut with respect to subcircuit `c` (exactly one
//!   endpoint inside). Each physical cut is therefore marked twice, once on
//!   each side.
//! - `zp[e][c] = x[e][c] AND y[target][c]`: the cut edge introduces a fresh
//!   qubit into `c` (standard AND linearization; the fourth inequality of
//!   the product encoding is the binary lower bound).
//! - `zo[e][c] = x[e][c] AND y[source][c]`: the cut edge measures a qubit
//!   out of `c`.
//!
//! The qubit aggregates are linear sums over these: `a` from vertex
//! weights, `p` from `zp`, `o` from `zo`, with `f = a + p - o` and
//! `d = a + p <= capacity`. Aggregates are equalities over binaries, so
//! they are declared continuous and snap to integers in any solution.

use good_lp::{Solution, Variable, constraint};
use tracing::{debug, info};

use cutshot_ir::WorkloadGraph;

use crate::error::{ConstraintFamily, PlanError, PlanResult};
use crate::model::{MilpBuilder, lp_sum, round_count};
use crate::plan::{
    CutEdge, PartitionPlan, SolveStatus, SubcircuitAggregates, SubcircuitPlan,
};

/// Decision-variable families of one partitioning model, plus the handles
/// needed to read the solution back out.
pub(crate) struct PartitionVars {
    /// `y[v][c]`.
    pub assign: Vec<Vec<Variable>>,
    /// `x[e][c]`.
    pub cut: Vec<Vec<Variable>>,
    /// Aggregates, indexed by subcircuit.
    pub input_qubits: Vec<Variable>,
    pub init_qubits: Vec<Variable>,
    pub measured_qubits: Vec<Variable>,
    pub contributing_qubits: Vec<Variable>,
    pub total_qubits: Vec<Variable>,
}

/// Install the partitioning variable and constraint families into `builder`.
///
/// Shared between the standalone partitioner and the combined planner.
pub(crate) fn build_partition_families(
    builder: &mut MilpBuilder,
    graph: &WorkloadGraph,
    capacity: u32,
    num_subcircuits: usize,
) -> PartitionVars {
    let n = graph.num_vertices();
    let edges = graph.edges();

    let assign: Vec<Vec<Variable>> = (0..n)
        .map(|_| (0..num_subcircuits).map(|_| builder.binary()).collect())
        .collect();
    let cut: Vec<Vec<Variable>> = (0..edges.len())
        .map(|_| (0..num_subcircuits).map(|_| builder.binary()).collect())
        .collect();
    let zp: Vec<Vec<Variable>> = (0..edges.len())
        .map(|_| (0..num_subcircuits).map(|_| builder.binary()).collect())
        .collect();
    let zo: Vec<Vec<Variable>> = (0..edges.len())
        .map(|_| (0..num_subcircuits).map(|_| builder.binary()).collect())
        .collect();

    let input_qubits: Vec<Variable> = (0..num_subcircuits).map(|_| builder.continuous(0.0)).collect();
    let init_qubits: Vec<Variable> = (0..num_subcircuits).map(|_| builder.continuous(0.0)).collect();
    let measured_qubits: Vec<Variable> =
        (0..num_subcircuits).map(|_| builder.continuous(0.0)).collect();
    let contributing_qubits: Vec<Variable> =
        (0..num_subcircuits).map(|_| builder.continuous(0.0)).collect();
    let total_qubits: Vec<Variable> = (0..num_subcircuits).map(|_| builder.continuous(0.0)).collect();

    // Aggregate equalities per subcircuit.
    for c in 0..num_subcircuits {
        let weight_sum = lp_sum(
            (0..n).map(|v| f64::from(graph.weight(v)) * assign[v][c]),
        );
        builder.constrain(constraint!(input_qubits[c] == weight_sum));

        let zp_sum = lp_sum((0..edges.len()).map(|e| zp[e][c]));
        builder.constrain(constraint!(init_qubits[c] == zp_sum));

        let zo_sum = lp_sum((0..edges.len()).map(|e| zo[e][c]));
        builder.constrain(constraint!(measured_qubits[c] == zo_sum));

        builder.constrain(constraint!(
            contributing_qubits[c] == input_qubits[c] + init_qubits[c] - measured_qubits[c]
        ));
        builder.constrain(constraint!(
            total_qubits[c] == input_qubits[c] + init_qubits[c]
        ));

        builder.constrain(constraint!(total_qubits[c] <= f64::from(capacity)));
    }

    // AND linearizations for zp (introduced) and zo (measured out).
    for (e, &(source, target)) in edges.iter().enumerate() {
        for c in 0..num_subcircuits {
            builder.constrain(constraint!(zp[e][c] <= cut[e][c]));
            builder.constrain(constraint!(zp[e][c] <= assign[target][c]));
            builder.constrain(constraint!(
                zp[e][c] >= cut[e][c] + assign[target][c] - 1.0
            ));

            builder.constrain(constraint!(zo[e][c] <= cut[e][c]));
            builder.constrain(constraint!(zo[e][c] <= assign[source][c]));
            builder.constrain(constraint!(
                zo[e][c] >= cut[e][c] + assign[source][c] - 1.0
            ));
        }
    }

    // Every vertex lives in exactly one subcircuit.
    for v in 0..n {
        let membership = lp_sum((0..num_subcircuits).map(|c| assign[v][c]));
        builder.constrain(constraint!(membership == 1.0));
    }

    // Cut consistency: x[e][c] = 1 iff exactly one endpoint is inside c.
    for (e, &(source, target)) in edges.iter().enumerate() {
        for c in 0..num_subcircuits {
            builder.constrain(constraint!(
                cut[e][c] <= assign[source][c] + assign[target][c]
            ));
            builder.constrain(constraint!(
                cut[e][c] >= assign[source][c] - assign[target][c]
            ));
            builder.constrain(constraint!(
                cut[e][c] >= assign[target][c] - assign[source][c]
            ));
            builder.constrain(constraint!(
                cut[e][c] + assign[source][c] + assign[target][c] <= 2.0
            ));
        }
    }

    // Symmetry breaking: vertex k may not open a subcircuit with an index
    // above k, so permutations of subcircuit labels are not re-enumerated.
    for k in 0..n.min(num_subcircuits) {
        if k + 1 >= num_subcircuits {
            continue;
        }
        let above = lp_sum((k + 1..num_subcircuits).map(|j| assign[k][j]));
        builder.constrain(constraint!(above == 0.0));
    }

    PartitionVars {
        assign,
        cut,
        input_qubits,
        init_qubits,
        measured_qubits,
        contributing_qubits,
        total_qubits,
    }
}

/// Read a [`PartitionPlan`] out of a solved model.
pub(crate) fn extract_partition_plan(
    solution: &impl Solution,
    vars: &PartitionVars,
    graph: &WorkloadGraph,
    objective: f64,
    status: SolveStatus,
) -> PlanResult<PartitionPlan> {
    let n = graph.num_vertices();
    let edges = graph.edges();
    let num_subcircuits = vars.input_qubits.len();

    let mut assignment = Vec::with_capacity(n);
    for v in 0..n {
        let c = (0..num_subcircuits)
            .find(|&c| solution.value(vars.assign[v][c]) > 0.5)
            .ok_or_else(|| {
                PlanError::SolverFailure(format!("vertex {v} left unassigned by the solver"))
            })?;
        assignment.push(c);
    }

    let mut cut_edges = Vec::new();
    for (e, &(source, target)) in edges.iter().enumerate() {
        for c in 0..num_subcircuits {
            if solution.value(vars.cut[e][c]) > 0.5 {
                cut_edges.push(CutEdge { source, target, subcircuit: c });
            }
        }
    }
    let cut_count = (cut_edges.len() / 2) as u32;

    let mut subcircuits = Vec::with_capacity(num_subcircuits);
    for c in 0..num_subcircuits {
        let vertices: Vec<usize> = (0..n).filter(|&v| assignment[v] == c).collect();

        let mut cuts_in = Vec::new();
        let mut cuts_out = Vec::new();
        for marker in cut_edges.iter().filter(|m| m.subcircuit == c) {
            if assignment[marker.source] == c {
                cuts_out.push(marker.source);
            } else {
                cuts_in.push(marker.target);
            }
        }

        let aggregates = SubcircuitAggregates {
            input_qubits: round_count(solution.value(vars.input_qubits[c])) as u32,
            init_qubits: round_count(solution.value(vars.init_qubits[c])) as u32,
            measured_qubits: round_count(solution.value(vars.measured_qubits[c])) as u32,
            contributing_qubits: round_count(solution.value(vars.contributing_qubits[c])) as u32,
            total_qubits: round_count(solution.value(vars.total_qubits[c])) as u32,
        };

        subcircuits.push(SubcircuitPlan { index: c, vertices, aggregates, cuts_in, cuts_out });
    }

    Ok(PartitionPlan {
        assignment,
        subcircuits,
        cut_edges,
        cut_count,
        objective,
        status,
    })
}

/// Partition the workload into at most `max_partitions` subcircuits of at
/// most `capacity` qubits each, minimizing the cut count.
///
/// Fails fast with [`PlanError::Infeasible`] when capacity arithmetic rules
/// out every assignment, and with [`PlanError::InvalidInput`] on a malformed
/// request.
pub fn partition(
    graph: &WorkloadGraph,
    capacity: u32,
    max_partitions: usize,
) -> PlanResult<PartitionPlan> {
    if max_partitions == 0 {
        return Err(PlanError::InvalidInput(
            "max_partitions must be at least 1".into(),
        ));
    }
    if graph.max_weight() > capacity {
        return Err(PlanError::Infeasible {
            family: ConstraintFamily::Capacity,
            detail: format!(
                "a single vertex weighs {} qubits, capacity is {capacity}",
                graph.max_weight()
            ),
        });
    }
    if graph.total_weight() > u64::from(capacity) * max_partitions as u64 {
        return Err(PlanError::Infeasible {
            family: ConstraintFamily::Capacity,
            detail: format!(
                "{} total qubits cannot fit {max_partitions} subcircuits of {capacity}",
                graph.total_weight()
            ),
        });
    }

    debug!(
        vertices = graph.num_vertices(),
        edges = graph.num_edges(),
        capacity,
        max_partitions,
        "building partition model"
    );

    let mut builder = MilpBuilder::new();
    let vars = build_partition_families(&mut builder, graph, capacity, max_partitions);

    // Each physical cut is marked once on each side, hence the halving.
    let cut_total = lp_sum(vars.cut.iter().flatten().copied());
    builder.add_objective(cut_total * 0.5);

    let solution = builder.solve(ConstraintFamily::Capacity)?;

    let objective = 0.5
        * vars
            .cut
            .iter()
            .flatten()
            .map(|&v| solution.value(v))
            .sum::<f64>();

    let plan =
        extract_partition_plan(&solution, &vars, graph, objective, SolveStatus::Optimal)?;
    plan.validate(capacity)
        .map_err(|e| PlanError::SolverFailure(format!("inconsistent partition returned: {e}")))?;

    info!(
        cuts = plan.cut_count,
        subcircuits = plan.non_empty().count(),
        "partitioning complete"
    );
    Ok(plan)
}
