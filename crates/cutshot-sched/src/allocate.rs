//! Backend selector and shot allocator.
//!
//! Consumes the subcircuit sizes produced by the partitioner (the `d`
//! aggregates) and decides, per subcircuit, which backends run it and how
//! its shot budget is divided among them.
//!
//! A backend's `execution_time` estimates running one subcircuit's *full*
//! budget, so a backend carrying a share `s / budget` of the shots
//! contributes `execution_time * s / budget` to its busy time. The uniform
//! modes fix the share at `1 / k` and enumerate the bounded domain of `k`
//! (exact division is not representable inside a linear program); the
//! nonuniform mode makes the shares integer decision variables.

use good_lp::{Solution, Variable, constraint};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use cutshot_ir::{BackendDescriptor, ObjectiveMode, PlannerConfig, QosWeights};

use crate::error::{ConstraintFamily, PlanError, PlanResult};
use crate::model::{Deadline, MilpBuilder, lp_sum, round_count};
use crate::plan::{AllocationPlan, BackendUsage, ShotAllocation, SolveStatus};

/// Per-backend QoS penalty: weighted normalized price plus weighted
/// unreliability. Zero when both weights are zero.
pub(crate) fn qos_penalties(backends: &[BackendDescriptor], weights: &QosWeights) -> Vec<f64> {
    let max_price = backends
        .iter()
        .filter_map(|b| b.price_per_shot)
        .fold(0.0_f64, f64::max);

    backends
        .iter()
        .map(|b| {
            let price_norm = if max_price > 0.0 {
                b.price_per_shot.unwrap_or(0.0) / max_price
            } else {
                0.0
            };
            let unreliability = 1.0 - b.reliability.unwrap_or(1.0);
            weights.price_weight * price_norm + weights.reliability_weight * unreliability
        })
        .collect()
}

/// Eligibility of every backend for every scheduled subcircuit.
struct Eligibility {
    /// `matrix[c][q]`: backend `q` may host subcircuit `c` (not excluded by
    /// a predicate, sufficient capacity). Indexed like `subcircuit_sizes`.
    matrix: Vec<Vec<bool>>,
}

impl Eligibility {
    fn evaluate(
        backends: &[BackendDescriptor],
        subcircuit_sizes: &[u32],
        config: &PlannerConfig,
    ) -> PlanResult<Self> {
        let excluded: Vec<bool> = backends
            .iter()
            .map(|b| config.predicates.iter().any(|p| p.excludes(b)))
            .collect();

        let mut matrix = Vec::with_capacity(subcircuit_sizes.len());
        for (c, &size) in subcircuit_sizes.iter().enumerate() {
            let row: Vec<bool> = backends
                .iter()
                .enumerate()
                .map(|(q, b)| !excluded[q] && b.capacity >= size)
                .collect();

            if size > 0 && !row.iter().any(|&ok| ok) {
                // Distinguish "predicates removed every fitting backend"
                // from "nothing is large enough".
                let fits_somewhere = backends.iter().any(|b| b.capacity >= size);
                let family = if fits_somewhere {
                    ConstraintFamily::Predicate
                } else {
                    ConstraintFamily::Capacity
                };
                return Err(PlanError::Infeasible {
                    family,
                    detail: format!("no eligible backend for subcircuit {c} ({size} qubits)"),
                });
            }
            matrix.push(row);
        }

        Ok(Self { matrix })
    }
}

/// Allocate backends and shots for the given subcircuit sizes.
///
/// Subcircuits with size zero are empty and receive no shots; every other
/// subcircuit receives exactly `config.shots_per_subcircuit` shots across
/// its selected backends.
pub fn allocate(
    backends: &[BackendDescriptor],
    subcircuit_sizes: &[u32],
    config: &PlannerConfig,
) -> PlanResult<AllocationPlan> {
    allocate_with_deadline(
        backends,
        subcircuit_sizes,
        config,
        Deadline::from_limit(config.solver_time_limit),
    )
}

pub(crate) fn allocate_with_deadline(
    backends: &[BackendDescriptor],
    subcircuit_sizes: &[u32],
    config: &PlannerConfig,
    deadline: Deadline,
) -> PlanResult<AllocationPlan> {
    if backends.is_empty() {
        return Err(PlanError::InvalidInput("no backends given".into()));
    }
    if subcircuit_sizes.is_empty() {
        return Err(PlanError::InvalidInput("no subcircuits to schedule".into()));
    }
    for backend in backends {
        backend.validate()?;
    }
    config.validate()?;

    let eligibility = Eligibility::evaluate(backends, subcircuit_sizes, config)?;

    debug!(
        backends = backends.len(),
        subcircuits = subcircuit_sizes.len(),
        mode = ?config.objective_mode,
        "building allocation model"
    );

    let plan = match config.objective_mode {
        ObjectiveMode::SingleSelect => {
            solve_single_select(backends, subcircuit_sizes, config, &eligibility)
        }
        ObjectiveMode::JointUniform => solve_uniform(
            backends,
            subcircuit_sizes,
            config,
            &eligibility,
            &vec![0.0; backends.len()],
            deadline,
        ),
        ObjectiveMode::JointQos if config.uniform_split => solve_uniform(
            backends,
            subcircuit_sizes,
            config,
            &eligibility,
            &qos_penalties(backends, &config.qos_weights),
            deadline,
        ),
        // QoS with a free split is the nonuniform model.
        ObjectiveMode::JointQos | ObjectiveMode::JointNonuniform => {
            solve_nonuniform(backends, subcircuit_sizes, config, &eligibility)
        }
    }?;

    plan.validate(config.shots_per_subcircuit)
        .map_err(|e| PlanError::SolverFailure(format!("inconsistent allocation returned: {e}")))?;

    info!(
        makespan = plan.makespan,
        objective = plan.objective,
        "allocation complete"
    );
    Ok(plan)
}

/// Exactly one backend per subcircuit; minimize summed queue + execution
/// latency of the selections.
fn solve_single_select(
    backends: &[BackendDescriptor],
    subcircuit_sizes: &[u32],
    config: &PlannerConfig,
    eligibility: &Eligibility,
) -> PlanResult<AllocationPlan> {
    let num_backends = backends.len();
    let mut builder = MilpBuilder::new();

    let select: Vec<Vec<Variable>> = subcircuit_sizes
        .iter()
        .map(|_| (0..num_backends).map(|_| builder.binary()).collect())
        .collect();

    for (c, &size) in subcircuit_sizes.iter().enumerate() {
        if size == 0 {
            // Empty subcircuit: nothing may be selected for it.
            for q in 0..num_backends {
                builder.constrain(constraint!(select[c][q] <= 0.0));
            }
            continue;
        }
        for q in 0..num_backends {
            if !eligibility.matrix[c][q] {
                // Constant zero bound: predicates and capacity misfits are
                // hard exclusions, never soft penalties.
                builder.constrain(constraint!(select[c][q] <= 0.0));
            }
        }
        let chosen = lp_sum((0..num_backends).map(|q| select[c][q]));
        builder.constrain(constraint!(chosen == 1.0));

        let latency = lp_sum(
            (0..num_backends).map(|q| backends[q].base_latency() * select[c][q]),
        );
        builder.add_objective(latency);
    }

    let solution = builder.solve(ConstraintFamily::Predicate)?;

    let budget = config.shots_per_subcircuit;
    let mut allocations = Vec::with_capacity(subcircuit_sizes.len());
    let mut objective = 0.0;
    for (c, &size) in subcircuit_sizes.iter().enumerate() {
        if size == 0 {
            allocations.push(Vec::new());
            continue;
        }
        let q = (0..num_backends)
            .find(|&q| solution.value(select[c][q]) > 0.5)
            .ok_or_else(|| {
                PlanError::SolverFailure(format!("no backend selected for subcircuit {c}"))
            })?;
        objective += backends[q].base_latency();
        allocations.push(vec![ShotAllocation {
            backend_id: backends[q].id.clone(),
            shots: budget,
        }]);
    }

    let (usage, makespan) = summarize_usage(backends, &allocations, budget);
    Ok(AllocationPlan {
        allocations,
        usage,
        makespan,
        objective,
        status: SolveStatus::Optimal,
    })
}

/// Uniform split: per subcircuit, enumerate the selected-backend count `k`,
/// solve a small epigraph model per `k`, and keep the best candidate.
fn solve_uniform(
    backends: &[BackendDescriptor],
    subcircuit_sizes: &[u32],
    config: &PlannerConfig,
    eligibility: &Eligibility,
    penalties: &[f64],
    deadline: Deadline,
) -> PlanResult<AllocationPlan> {
    let budget = config.shots_per_subcircuit;
    let mut allocations = Vec::with_capacity(subcircuit_sizes.len());
    let mut objective = 0.0;
    let mut status = SolveStatus::Optimal;

    for (c, &size) in subcircuit_sizes.iter().enumerate() {
        if size == 0 {
            allocations.push(Vec::new());
            continue;
        }

        let eligible: Vec<usize> = (0..backends.len())
            .filter(|&q| eligibility.matrix[c][q])
            .collect();

        let big_m = eligible
            .iter()
            .map(|&q| backends[q].base_latency())
            .fold(0.0_f64, f64::max)
            + 1.0;

        let mut best: Option<(f64, Vec<usize>)> = None;
        for k in 1..=eligible.len() {
            if deadline.expired() {
                if best.is_some() {
                    status = SolveStatus::SubOptimal;
                    break;
                }
                return Err(PlanError::SolverLimit(format!(
                    "deadline expired before subcircuit {c} had a candidate"
                )));
            }

            let share = 1.0 / k as f64;
            let mut builder = MilpBuilder::new();
            let select: FxHashMap<usize, Variable> =
                eligible.iter().map(|&q| (q, builder.binary())).collect();
            let worst = builder.continuous(0.0);

            let count = lp_sum(eligible.iter().map(|&q| select[&q]));
            builder.constrain(constraint!(count == k as f64));

            // Epigraph: the worst latency dominates every selected
            // backend's queue + share-scaled execution time; big-M disables
            // the bound for unselected backends.
            for &q in &eligible {
                let term = backends[q].queue_time + backends[q].execution_time * share;
                builder.constrain(constraint!(
                    worst - (term - big_m) >= big_m * select[&q]
                ));
            }

            let penalty = lp_sum(
                eligible
                    .iter()
                    .map(|&q| (penalties[q] * share) * select[&q]),
            );
            builder.add_objective(worst + penalty);

            let solution = builder.solve(ConstraintFamily::Predicate)?;
            let chosen: Vec<usize> = eligible
                .iter()
                .copied()
                .filter(|&q| solution.value(select[&q]) > 0.5)
                .collect();
            let candidate = solution.value(worst)
                + chosen.iter().map(|&q| penalties[q] * share).sum::<f64>()
                + config.postprocessing_time;

            if best.as_ref().is_none_or(|(obj, _)| candidate < *obj) {
                best = Some((candidate, chosen));
            }
        }

        let (best_objective, chosen) = best.ok_or_else(|| {
            PlanError::Infeasible {
                family: ConstraintFamily::Predicate,
                detail: format!("no backend subset found for subcircuit {c}"),
            }
        })?;
        objective += best_objective;
        allocations.push(split_evenly(backends, &chosen, budget));
    }

    let (usage, makespan) = summarize_usage(backends, &allocations, budget);
    Ok(AllocationPlan {
        allocations,
        usage,
        makespan,
        objective,
        status,
    })
}

/// Divide `budget` across `chosen` backends as evenly as integers allow,
/// spilling the remainder one shot at a time from the front.
fn split_evenly(
    backends: &[BackendDescriptor],
    chosen: &[usize],
    budget: u64,
) -> Vec<ShotAllocation> {
    let k = chosen.len() as u64;
    let base = budget / k;
    let remainder = (budget % k) as usize;
    chosen
        .iter()
        .enumerate()
        .map(|(i, &q)| ShotAllocation {
            backend_id: backends[q].id.clone(),
            shots: base + u64::from(i < remainder),
        })
        .collect()
}

/// Nonuniform split: one joint MILP with integer shot variables. Subcircuits
/// couple through shared backends and the makespan epigraph.
fn solve_nonuniform(
    backends: &[BackendDescriptor],
    subcircuit_sizes: &[u32],
    config: &PlannerConfig,
    eligibility: &Eligibility,
) -> PlanResult<AllocationPlan> {
    let budget = config.shots_per_subcircuit;
    let budget_f = budget as f64;
    let num_backends = backends.len();
    let scheduled: Vec<usize> = (0..subcircuit_sizes.len())
        .filter(|&c| subcircuit_sizes[c] > 0)
        .collect();
    let penalties = qos_penalties(backends, &config.qos_weights);

    let mut builder = MilpBuilder::new();

    // shots[i][q] and select[i][q], indexed by position in `scheduled`.
    let shots: Vec<Vec<Variable>> = scheduled
        .iter()
        .map(|_| (0..num_backends).map(|_| builder.integer(0.0, budget_f)).collect())
        .collect();
    let select: Vec<Vec<Variable>> = scheduled
        .iter()
        .map(|_| (0..num_backends).map(|_| builder.binary()).collect())
        .collect();
    let used: Vec<Variable> = (0..num_backends).map(|_| builder.binary()).collect();
    let busy: Vec<Variable> = (0..num_backends).map(|_| builder.continuous(0.0)).collect();
    let makespan = builder.continuous(0.0);

    for (i, &c) in scheduled.iter().enumerate() {
        // Full budget per subcircuit, spread over its selected backends.
        let total = lp_sum((0..num_backends).map(|q| shots[i][q]));
        builder.constrain(constraint!(total == budget_f));

        for q in 0..num_backends {
            if !eligibility.matrix[c][q] {
                builder.constrain(constraint!(select[i][q] <= 0.0));
            }
            // Selected iff the allocated shot count is strictly positive.
            builder.constrain(constraint!(shots[i][q] <= budget_f * select[i][q]));
            builder.constrain(constraint!(select[i][q] <= shots[i][q]));
        }
    }

    let activation_m = budget_f * scheduled.len() as f64;
    for q in 0..num_backends {
        let routed = lp_sum(scheduled.iter().enumerate().map(|(i, _)| shots[i][q]));
        builder.constrain(constraint!(routed <= activation_m * used[q]));

        // Busy time: queue delay (once, when used) plus the share-scaled
        // execution load across all subcircuits routed here.
        let load = lp_sum(
            scheduled
                .iter()
                .enumerate()
                .map(|(i, _)| (backends[q].execution_time / budget_f) * shots[i][q]),
        );
        builder.constrain(constraint!(
            busy[q] >= backends[q].queue_time * used[q] + load
        ));
        builder.constrain(constraint!(makespan >= busy[q]));
    }

    let penalty_of = &penalties;
    let shot_vars = &shots;
    let qos = lp_sum(scheduled.iter().enumerate().flat_map(|(i, _)| {
        (0..num_backends).map(move |q| (penalty_of[q] / budget_f) * shot_vars[i][q])
    }));
    builder.add_objective(makespan + qos);

    let solution = builder.solve(ConstraintFamily::Capacity)?;

    let mut allocations = vec![Vec::new(); subcircuit_sizes.len()];
    for (i, &c) in scheduled.iter().enumerate() {
        let mut row = Vec::new();
        for q in 0..num_backends {
            let count = round_count(solution.value(shots[i][q]));
            if count > 0 {
                row.push(ShotAllocation {
                    backend_id: backends[q].id.clone(),
                    shots: count,
                });
            }
        }
        allocations[c] = row;
    }

    let (usage, makespan_value) = summarize_usage(backends, &allocations, budget);
    let qos_value = allocations
        .iter()
        .flatten()
        .map(|a| {
            let q = backends.iter().position(|b| b.id == a.backend_id).unwrap_or(0);
            penalties[q] * a.shots as f64 / budget_f
        })
        .sum::<f64>();

    Ok(AllocationPlan {
        allocations,
        usage,
        makespan: makespan_value,
        objective: makespan_value + qos_value + config.postprocessing_time,
        status: SolveStatus::Optimal,
    })
}

/// Recompute per-backend busy times from an allocation: queue delay once
/// per used backend, plus the share-scaled execution load.
pub(crate) fn summarize_usage(
    backends: &[BackendDescriptor],
    allocations: &[Vec<ShotAllocation>],
    budget: u64,
) -> (Vec<BackendUsage>, f64) {
    let mut shots_by_backend: FxHashMap<&str, u64> = FxHashMap::default();
    let mut load_by_backend: FxHashMap<&str, f64> = FxHashMap::default();

    for allocation in allocations.iter().flatten() {
        *shots_by_backend.entry(&allocation.backend_id).or_default() += allocation.shots;
        *load_by_backend.entry(&allocation.backend_id).or_default() +=
            allocation.shots as f64 / budget as f64;
    }

    let mut usage = Vec::new();
    let mut makespan = 0.0_f64;
    for backend in backends {
        let Some(&total_shots) = shots_by_backend.get(backend.id.as_str()) else {
            continue;
        };
        let busy_time =
            backend.queue_time + backend.execution_time * load_by_backend[backend.id.as_str()];
        makespan = makespan.max(busy_time);
        usage.push(BackendUsage {
            backend_id: backend.id.clone(),
            busy_time,
            total_shots,
        });
    }
    (usage, makespan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutshot_ir::BackendPredicate;

    fn config(mode: ObjectiveMode) -> PlannerConfig {
        PlannerConfig {
            objective_mode: mode,
            shots_per_subcircuit: 100,
            max_qubits_per_subcircuit: 4,
            num_subcircuits: 1,
            ..Default::default()
        }
    }

    fn five_backends() -> Vec<BackendDescriptor> {
        vec![
            BackendDescriptor::new("q0", 10.0, 1.0, 8),
            BackendDescriptor::new("q1", 20.0, 4.0, 8),
            BackendDescriptor::new("q2", 15.0, 3.0, 8),
            BackendDescriptor::new("q3", 30.0, 1.0, 8),
            BackendDescriptor::new("q4", 10.0, 3.0, 8),
        ]
    }

    #[test]
    fn test_single_select_picks_lowest_latency() {
        let plan = allocate(
            &five_backends(),
            &[4],
            &config(ObjectiveMode::SingleSelect),
        )
        .unwrap();

        assert_eq!(plan.allocations[0].len(), 1);
        assert_eq!(plan.allocations[0][0].backend_id, "q0");
        assert_eq!(plan.allocations[0][0].shots, 100);
        assert!((plan.objective - 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_select_skips_undersized_backends() {
        let backends = vec![
            BackendDescriptor::new("small_fast", 1.0, 0.0, 2),
            BackendDescriptor::new("big_slow", 50.0, 5.0, 10),
        ];
        let plan = allocate(&backends, &[6], &config(ObjectiveMode::SingleSelect)).unwrap();
        assert_eq!(plan.allocations[0][0].backend_id, "big_slow");
    }

    #[test]
    fn test_uniform_split_uses_parallelism() {
        // Two identical zero-queue backends: splitting halves the latency.
        let backends = vec![
            BackendDescriptor::new("a", 10.0, 0.0, 8),
            BackendDescriptor::new("b", 10.0, 0.0, 8),
        ];
        let plan = allocate(&backends, &[4], &config(ObjectiveMode::JointUniform)).unwrap();

        assert_eq!(plan.allocations[0].len(), 2);
        assert!((plan.objective - 5.0).abs() < 1e-6);
        let total: u64 = plan.allocations[0].iter().map(|a| a.shots).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_uniform_split_avoids_slow_queue() {
        // A huge queue delay makes the second backend useless even though
        // splitting would halve the execution share.
        let backends = vec![
            BackendDescriptor::new("fast", 10.0, 0.0, 8),
            BackendDescriptor::new("stuck", 10.0, 1000.0, 8),
        ];
        let plan = allocate(&backends, &[4], &config(ObjectiveMode::JointUniform)).unwrap();
        assert_eq!(plan.allocations[0].len(), 1);
        assert_eq!(plan.allocations[0][0].backend_id, "fast");
    }

    #[test]
    fn test_qos_weights_steer_selection() {
        let backends = vec![
            BackendDescriptor::new("cheap", 10.0, 0.0, 8)
                .with_price(0.01)
                .with_reliability(0.99),
            BackendDescriptor::new("pricey", 10.0, 0.0, 8)
                .with_price(1.0)
                .with_reliability(0.99),
        ];
        let mut cfg = config(ObjectiveMode::JointQos);
        cfg.qos_weights.price_weight = 100.0;
        let plan = allocate(&backends, &[4], &cfg).unwrap();

        // The price penalty outweighs the parallelism gain.
        assert_eq!(plan.allocations[0].len(), 1);
        assert_eq!(plan.allocations[0][0].backend_id, "cheap");
    }

    #[test]
    fn test_nonuniform_conserves_budget() {
        let backends = vec![
            BackendDescriptor::new("a", 10.0, 0.0, 8),
            BackendDescriptor::new("b", 30.0, 0.0, 8),
        ];
        let mut cfg = config(ObjectiveMode::JointNonuniform);
        cfg.shots_per_subcircuit = 20;
        let plan = allocate(&backends, &[4, 3], &cfg).unwrap();

        for c in 0..2 {
            let total: u64 = plan.allocations[c].iter().map(|a| a.shots).sum();
            assert_eq!(total, 20);
        }
        plan.validate(20).unwrap();
    }

    #[test]
    fn test_predicate_pins_backend_to_zero() {
        let backends = vec![
            BackendDescriptor::new("allowed", 50.0, 5.0, 8).with_region("eu-west"),
            BackendDescriptor::new("denied", 1.0, 0.0, 8).with_region("us-east"),
        ];
        let mut cfg = config(ObjectiveMode::JointNonuniform);
        cfg.shots_per_subcircuit = 10;
        cfg.predicates = vec![BackendPredicate::AllowedRegions(vec!["eu-west".into()])];
        let plan = allocate(&backends, &[4], &cfg).unwrap();

        assert!(plan.allocations[0].iter().all(|a| a.backend_id == "allowed"));
    }

    #[test]
    fn test_all_excluded_is_infeasible() {
        let backends = vec![
            BackendDescriptor::new("out_of_region", 1.0, 0.0, 8).with_region("us-east"),
            BackendDescriptor::new("too_small", 1.0, 0.0, 2).with_region("eu-west"),
        ];
        let mut cfg = config(ObjectiveMode::SingleSelect);
        cfg.predicates = vec![BackendPredicate::AllowedRegions(vec!["eu-west".into()])];
        let err = allocate(&backends, &[4], &cfg).unwrap_err();
        assert!(matches!(
            err,
            PlanError::Infeasible { family: ConstraintFamily::Predicate, .. }
        ));
    }

    #[test]
    fn test_capacity_infeasibility_family() {
        let backends = vec![BackendDescriptor::new("tiny", 1.0, 0.0, 2)];
        let err = allocate(&backends, &[4], &config(ObjectiveMode::SingleSelect)).unwrap_err();
        assert!(matches!(
            err,
            PlanError::Infeasible { family: ConstraintFamily::Capacity, .. }
        ));
    }

    #[test]
    fn test_empty_backend_list_rejected() {
        let err = allocate(&[], &[4], &config(ObjectiveMode::SingleSelect)).unwrap_err();
        assert!(matches!(err, PlanError::InvalidInput(_)));
    }

    #[test]
    fn test_split_evenly_distributes_remainder() {
        let backends = vec![
            BackendDescriptor::new("a", 1.0, 0.0, 8),
            BackendDescriptor::new("b", 1.0, 0.0, 8),
            BackendDescriptor::new("c", 1.0, 0.0, 8),
        ];
        let split = split_evenly(&backends, &[0, 1, 2], 100);
        let shots: Vec<u64> = split.iter().map(|a| a.shots).collect();
        assert_eq!(shots, vec![34, 33, 33]);
        assert_eq!(shots.iter().sum::<u64>(), 100);
    }
}
