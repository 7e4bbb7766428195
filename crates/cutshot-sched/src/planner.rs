//! Top-level planner: ties the graph partitioner and the shot allocator
//! together under one objective.
//!
//! Two solve shapes exist. The staged modes (`single_select`,
//! `joint_uniform`, and `joint_qos` with a uniform split) partition first
//! and allocate against the resulting subcircuit sizes. The nonuniform
//! modes fold both decisions into one MILP, so a partition with slightly
//! more cuts can still win when it unlocks a better backend fit.

use good_lp::{Solution, Variable, constraint};
use tracing::{debug, info};

use cutshot_ir::{BackendDescriptor, ObjectiveMode, PlannerConfig, Problem, WorkloadGraph};

use crate::allocate::{allocate_with_deadline, qos_penalties, summarize_usage};
use crate::error::{ConstraintFamily, PlanError, PlanResult};
use crate::model::{Deadline, MilpBuilder, lp_sum, round_count};
use crate::partition::{build_partition_families, extract_partition_plan, partition};
use crate::plan::{AllocationPlan, CutShotPlan, ShotAllocation, SolveStatus};
use crate::postcost::ReconstructionCost;

/// One candidate examined by [`CutShotPlanner::plan_sweep`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct SweepCandidate {
    /// Subcircuit count this candidate was planned with.
    pub num_subcircuits: usize,
    /// Cuts the partition required.
    pub cut_count: u32,
    /// Composed solver objective.
    pub objective: f64,
    /// Post-hoc reconstruction cost for the cut count.
    pub reconstruction_cost: f64,
    /// Ranking score (objective plus reconstruction cost).
    pub score: f64,
}

/// Result of a subcircuit-count sweep: the winning plan and the scores of
/// every feasible candidate.
#[derive(Debug)]
pub struct SweepReport {
    pub best: CutShotPlan,
    pub best_num_subcircuits: usize,
    pub candidates: Vec<SweepCandidate>,
}

/// Plans one workload against one backend fleet.
pub struct CutShotPlanner<'a> {
    graph: &'a WorkloadGraph,
    backends: &'a [BackendDescriptor],
    config: PlannerConfig,
}

impl<'a> CutShotPlanner<'a> {
    /// Validate the inputs and build a planner. Rejects empty fleets and
    /// malformed configurations before any model is built.
    pub fn new(
        graph: &'a WorkloadGraph,
        backends: &'a [BackendDescriptor],
        config: PlannerConfig,
    ) -> PlanResult<Self> {
        if backends.is_empty() {
            return Err(PlanError::InvalidInput("no backends given".into()));
        }
        for backend in backends {
            backend.validate()?;
        }
        config.validate()?;
        Ok(Self { graph, backends, config })
    }

    /// Run one full optimization for the configured subcircuit count.
    pub fn plan(&self) -> PlanResult<CutShotPlan> {
        let deadline = Deadline::from_limit(self.config.solver_time_limit);
        self.plan_with_count(self.config.num_subcircuits, deadline)
    }

    /// Sweep the subcircuit count over `counts`, rank every feasible
    /// candidate by solver objective plus reconstruction cost, and return
    /// the winner.
    ///
    /// Candidates that are infeasible on their own (for example one
    /// subcircuit when the workload exceeds a single backend) are skipped;
    /// the sweep only fails when every candidate does. An expired time
    /// budget returns the incumbent tagged sub-optimal.
    pub fn plan_sweep(
        &self,
        counts: impl IntoIterator<Item = usize>,
        reconstruction: &dyn ReconstructionCost,
    ) -> PlanResult<SweepReport> {
        let deadline = Deadline::from_limit(self.config.solver_time_limit);
        let mut candidates = Vec::new();
        let mut best: Option<(f64, usize, CutShotPlan)> = None;
        let mut truncated = false;
        let mut last_error = None;

        for count in counts {
            if deadline.expired() {
                truncated = true;
                break;
            }
            let plan = match self.plan_with_count(count, deadline) {
                Ok(plan) => plan,
                Err(e @ PlanError::InvalidInput(_)) => return Err(e),
                Err(e) => {
                    debug!(num_subcircuits = count, error = %e, "sweep candidate rejected");
                    last_error = Some(e);
                    continue;
                }
            };

            let reconstruction_cost = reconstruction.evaluate(plan.partition.cut_count);
            let score = plan.objective + reconstruction_cost;
            candidates.push(SweepCandidate {
                num_subcircuits: count,
                cut_count: plan.partition.cut_count,
                objective: plan.objective,
                reconstruction_cost,
                score,
            });

            if best.as_ref().is_none_or(|(s, _, _)| score < *s) {
                best = Some((score, count, plan));
            }
        }

        let Some((_, best_num_subcircuits, mut best)) = best else {
            return Err(last_error.unwrap_or_else(|| {
                PlanError::SolverLimit("sweep ended before any candidate was planned".into())
            }));
        };
        if truncated {
            best.status = SolveStatus::SubOptimal;
        }

        info!(
            winner = best_num_subcircuits,
            candidates = candidates.len(),
            "sweep complete"
        );
        Ok(SweepReport { best, best_num_subcircuits, candidates })
    }

    /// `deadline` is shared with the caller: sweep candidates draw from one
    /// budget instead of each restarting the configured limit.
    fn plan_with_count(&self, num_subcircuits: usize, deadline: Deadline) -> PlanResult<CutShotPlan> {
        match self.config.objective_mode {
            ObjectiveMode::SingleSelect | ObjectiveMode::JointUniform => {
                self.plan_staged(num_subcircuits, deadline)
            }
            ObjectiveMode::JointQos if self.config.uniform_split => {
                self.plan_staged(num_subcircuits, deadline)
            }
            ObjectiveMode::JointQos | ObjectiveMode::JointNonuniform => {
                self.plan_combined(num_subcircuits)
            }
        }
    }

    /// Partition first, then allocate against the fixed subcircuit sizes.
    fn plan_staged(&self, num_subcircuits: usize, deadline: Deadline) -> PlanResult<CutShotPlan> {
        let partition_plan = partition(
            self.graph,
            self.config.max_qubits_per_subcircuit,
            num_subcircuits,
        )?;

        let sizes: Vec<u32> = partition_plan
            .subcircuits
            .iter()
            .map(|s| s.aggregates.total_qubits)
            .collect();

        let allocation =
            allocate_with_deadline(self.backends, &sizes, &self.config, deadline)?;

        let status = if allocation.status == SolveStatus::SubOptimal {
            SolveStatus::SubOptimal
        } else {
            partition_plan.status
        };
        let objective = self.compose_objective(
            partition_plan.cut_count,
            allocation.makespan + self.config.postprocessing_time,
            partition_plan.non_empty().count(),
        );

        Ok(CutShotPlan { partition: partition_plan, allocation, objective, status })
    }

    /// One MILP deciding partition, backend selection, and shot split
    /// together, minimizing the weighted normalized cut count and makespan.
    fn plan_combined(&self, num_subcircuits: usize) -> PlanResult<CutShotPlan> {
        let capacity = self.config.max_qubits_per_subcircuit;
        if self.graph.max_weight() > capacity {
            return Err(PlanError::Infeasible {
                family: ConstraintFamily::Capacity,
                detail: format!(
                    "a single vertex weighs {} qubits, capacity is {capacity}",
                    self.graph.max_weight()
                ),
            });
        }
        if num_subcircuits == 0 {
            return Err(PlanError::InvalidInput(
                "num_subcircuits must be at least 1".into(),
            ));
        }

        let budget = self.config.shots_per_subcircuit;
        let budget_f = budget as f64;
        let capacity_f = f64::from(capacity);
        let num_backends = self.backends.len();
        let penalties = qos_penalties(self.backends, &self.config.qos_weights);
        let excluded: Vec<bool> = self
            .backends
            .iter()
            .map(|b| self.config.predicates.iter().any(|p| p.excludes(b)))
            .collect();
        if excluded.iter().all(|&e| e) {
            return Err(PlanError::Infeasible {
                family: ConstraintFamily::Predicate,
                detail: "every backend is excluded by a predicate".into(),
            });
        }

        debug!(
            vertices = self.graph.num_vertices(),
            backends = num_backends,
            num_subcircuits,
            "building combined model"
        );

        let mut builder = MilpBuilder::new();
        let vars = build_partition_families(&mut builder, self.graph, capacity, num_subcircuits);

        // active[c]: subcircuit c received at least one vertex, hence a
        // shot budget.
        let active: Vec<Variable> = (0..num_subcircuits).map(|_| builder.binary()).collect();
        for c in 0..num_subcircuits {
            builder.constrain(constraint!(
                vars.total_qubits[c] <= capacity_f * active[c]
            ));
            let membership = lp_sum((0..self.graph.num_vertices()).map(|v| vars.assign[v][c]));
            builder.constrain(constraint!(active[c] <= membership));
        }

        let shots: Vec<Vec<Variable>> = (0..num_subcircuits)
            .map(|_| (0..num_backends).map(|_| builder.integer(0.0, budget_f)).collect())
            .collect();
        let select: Vec<Vec<Variable>> = (0..num_subcircuits)
            .map(|_| (0..num_backends).map(|_| builder.binary()).collect())
            .collect();
        let used: Vec<Variable> = (0..num_backends).map(|_| builder.binary()).collect();
        let busy: Vec<Variable> = (0..num_backends).map(|_| builder.continuous(0.0)).collect();
        let makespan = builder.continuous(0.0);

        for c in 0..num_subcircuits {
            let total = lp_sum((0..num_backends).map(|q| shots[c][q]));
            builder.constrain(constraint!(total == budget_f * active[c]));

            for q in 0..num_backends {
                if excluded[q] {
                    builder.constrain(constraint!(select[c][q] <= 0.0));
                }
                builder.constrain(constraint!(shots[c][q] <= budget_f * select[c][q]));
                builder.constrain(constraint!(select[c][q] <= shots[c][q]));

                // The selected backend must fit the subcircuit; big-M
                // releases the bound when unselected.
                builder.constrain(constraint!(
                    vars.total_qubits[c] + capacity_f * select[c][q]
                        <= f64::from(self.backends[q].capacity) + capacity_f
                ));
            }
        }

        let activation_m = budget_f * num_subcircuits as f64;
        for q in 0..num_backends {
            let routed = lp_sum((0..num_subcircuits).map(|c| shots[c][q]));
            builder.constrain(constraint!(routed <= activation_m * used[q]));

            let load = lp_sum((0..num_subcircuits).map(|c| {
                (self.backends[q].execution_time / budget_f) * shots[c][q]
            }));
            builder.constrain(constraint!(
                busy[q] >= self.backends[q].queue_time * used[q] + load
            ));
            builder.constrain(constraint!(makespan >= busy[q]));
        }

        // Weighted normalized objective: cuts against the all-cut bound,
        // makespan against the worst serial schedule.
        let cut_scale =
            self.config.cut_weight / (2.0 * self.graph.num_edges().max(1) as f64);
        let cut_total = lp_sum(vars.cut.iter().flatten().copied());
        let time_scale = self.config.time_weight / self.makespan_bound(num_subcircuits);
        let penalty_of = &penalties;
        let shot_vars = &shots;
        let qos = lp_sum((0..num_subcircuits).flat_map(|c| {
            (0..num_backends).map(move |q| (penalty_of[q] / budget_f) * shot_vars[c][q])
        }));
        builder.add_objective(cut_total * cut_scale + makespan * time_scale + qos);

        let solution = builder.solve(ConstraintFamily::Capacity)?;

        let cut_value = vars
            .cut
            .iter()
            .flatten()
            .map(|&v| solution.value(v))
            .sum::<f64>()
            * 0.5;
        let partition_plan = extract_partition_plan(
            &solution,
            &vars,
            self.graph,
            cut_value,
            SolveStatus::Optimal,
        )?;
        partition_plan.validate(capacity).map_err(|e| {
            PlanError::SolverFailure(format!("inconsistent partition returned: {e}"))
        })?;

        let mut allocations = vec![Vec::new(); num_subcircuits];
        for (c, row) in allocations.iter_mut().enumerate() {
            for q in 0..num_backends {
                let count = round_count(solution.value(shots[c][q]));
                if count > 0 {
                    row.push(ShotAllocation {
                        backend_id: self.backends[q].id.clone(),
                        shots: count,
                    });
                }
            }
        }
        let (usage, makespan_value) = summarize_usage(self.backends, &allocations, budget);
        let qos_value: f64 = allocations
            .iter()
            .flatten()
            .map(|a| {
                let q = self
                    .backends
                    .iter()
                    .position(|b| b.id == a.backend_id)
                    .unwrap_or(0);
                penalties[q] * a.shots as f64 / budget_f
            })
            .sum();

        let allocation = AllocationPlan {
            allocations,
            usage,
            makespan: makespan_value,
            objective: makespan_value + qos_value + self.config.postprocessing_time,
            status: SolveStatus::Optimal,
        };
        allocation.validate(budget).map_err(|e| {
            PlanError::SolverFailure(format!("inconsistent allocation returned: {e}"))
        })?;

        let objective = self.compose_objective(
            partition_plan.cut_count,
            makespan_value + qos_value + self.config.postprocessing_time,
            partition_plan.non_empty().count(),
        );

        info!(
            cuts = partition_plan.cut_count,
            makespan = makespan_value,
            objective,
            "combined planning complete"
        );
        Ok(CutShotPlan {
            partition: partition_plan,
            allocation,
            objective,
            status: SolveStatus::Optimal,
        })
    }

    /// Weighted, normalized composition of the cut count and a time value.
    ///
    /// Cuts normalize against cutting every edge; time against the worst
    /// serial schedule of the subcircuits that actually exist, so sweep
    /// candidates with different counts compare on the same scale. Both
    /// terms land in `[0, 1]`.
    fn compose_objective(&self, cut_count: u32, time_value: f64, active_subcircuits: usize) -> f64 {
        let cut_norm = f64::from(cut_count) / self.graph.num_edges().max(1) as f64;
        let time_norm = time_value / self.makespan_bound(active_subcircuits.max(1));
        self.config.cut_weight * cut_norm + self.config.time_weight * time_norm
    }

    /// Upper bound on any makespan: the slowest backend hosting every
    /// subcircuit's full budget behind its queue.
    fn makespan_bound(&self, num_subcircuits: usize) -> f64 {
        let bound = self
            .backends
            .iter()
            .map(|b| b.queue_time + num_subcircuits as f64 * b.execution_time)
            .fold(0.0_f64, f64::max);
        if bound > 0.0 { bound } else { 1.0 }
    }
}

/// Plan a fully described problem: materialize the workload graph, then run
/// the configured optimization once.
pub fn solve_problem(problem: &Problem) -> PlanResult<CutShotPlan> {
    let graph = problem.workload_graph()?;
    CutShotPlanner::new(&graph, &problem.backends, problem.config.clone())?.plan()
}
