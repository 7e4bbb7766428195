//! End-to-end scenarios for the partitioner, the allocator, and the
//! combined planner.

use cutshot_ir::{
    BackendDescriptor, BackendPredicate, ObjectiveMode, PlannerConfig, Problem, WorkloadGraph,
};
use cutshot_sched::{
    ConstraintFamily, CutShotPlanner, PlanError, PowerLaw, allocate, partition, solve_problem,
};

fn reference_fleet() -> Vec<BackendDescriptor> {
    vec![
        BackendDescriptor::new("qpu_a", 10.0, 1.0, 8),
        BackendDescriptor::new("qpu_b", 20.0, 4.0, 8),
        BackendDescriptor::new("qpu_c", 15.0, 3.0, 8),
        BackendDescriptor::new("qpu_d", 30.0, 1.0, 8),
        BackendDescriptor::new("qpu_e", 10.0, 3.0, 8),
    ]
}

#[test]
fn ten_qubit_path_splits_into_three_with_two_cuts() {
    // A 10-vertex unit-weight path at capacity 4 cannot fit in two
    // subcircuits (each cut costs the receiving side an extra init qubit),
    // and three subcircuits need exactly two cuts.
    let graph = WorkloadGraph::path(10).unwrap();
    let plan = partition(&graph, 4, 3).unwrap();

    assert_eq!(plan.cut_count, 2);
    plan.validate(4).unwrap();

    let mut total_vertices = 0;
    for subcircuit in plan.non_empty() {
        assert!(subcircuit.aggregates.consistent());
        assert!(subcircuit.aggregates.total_qubits <= 4);
        total_vertices += subcircuit.vertices.len();
    }
    assert_eq!(total_vertices, 10);
}

#[test]
fn single_select_picks_fastest_backend() {
    let config = PlannerConfig {
        objective_mode: ObjectiveMode::SingleSelect,
        shots_per_subcircuit: 1000,
        ..Default::default()
    };
    let plan = allocate(&reference_fleet(), &[4], &config).unwrap();

    // Queue 1 + execution 10 beats every other queue/execution pair.
    assert_eq!(plan.allocations[0].len(), 1);
    assert_eq!(plan.allocations[0][0].backend_id, "qpu_a");
    assert_eq!(plan.allocations[0][0].shots, 1000);
    assert!((plan.objective - 11.0).abs() < 1e-6);
}

#[test]
fn predicates_excluding_every_backend_report_infeasibility() {
    let config = PlannerConfig {
        objective_mode: ObjectiveMode::SingleSelect,
        predicates: vec![BackendPredicate::DenyBackends(
            reference_fleet().iter().map(|b| b.id.clone()).collect(),
        )],
        ..Default::default()
    };
    let err = allocate(&reference_fleet(), &[4], &config).unwrap_err();
    assert!(matches!(
        err,
        PlanError::Infeasible { family: ConstraintFamily::Predicate, .. }
    ));
}

#[test]
fn nonuniform_split_conserves_every_budget() {
    let backends = vec![
        BackendDescriptor::new("fast", 8.0, 0.5, 8),
        BackendDescriptor::new("slow", 24.0, 0.5, 8),
    ];
    let config = PlannerConfig {
        objective_mode: ObjectiveMode::JointNonuniform,
        shots_per_subcircuit: 30,
        ..Default::default()
    };
    let plan = allocate(&backends, &[4, 4], &config).unwrap();

    for allocations in &plan.allocations {
        let total: u64 = allocations.iter().map(|a| a.shots).sum();
        assert_eq!(total, 30);
        assert!(allocations.iter().all(|a| a.shots > 0));
    }
    plan.validate(30).unwrap();
}

#[test]
fn repeated_runs_return_identical_objectives() {
    let graph = WorkloadGraph::path(6).unwrap();
    let backends = reference_fleet();
    let config = PlannerConfig {
        objective_mode: ObjectiveMode::JointUniform,
        max_qubits_per_subcircuit: 4,
        num_subcircuits: 2,
        shots_per_subcircuit: 100,
        ..Default::default()
    };
    let planner = CutShotPlanner::new(&graph, &backends, config).unwrap();

    let first = planner.plan().unwrap();
    let second = planner.plan().unwrap();
    assert_eq!(first.objective, second.objective);
    assert_eq!(first.partition.assignment, second.partition.assignment);
    assert_eq!(first.allocation.allocations, second.allocation.allocations);
}

#[test]
fn uniform_split_beats_single_backend_when_queues_are_short() {
    let backends = vec![
        BackendDescriptor::new("twin_a", 10.0, 0.1, 8),
        BackendDescriptor::new("twin_b", 10.0, 0.1, 8),
    ];
    let config = PlannerConfig {
        objective_mode: ObjectiveMode::JointUniform,
        shots_per_subcircuit: 100,
        ..Default::default()
    };
    let plan = allocate(&backends, &[4], &config).unwrap();

    // Two selected backends each run half the budget: 0.1 + 10/2.
    assert_eq!(plan.allocations[0].len(), 2);
    assert!((plan.makespan - 5.1).abs() < 1e-6);
}

#[test]
fn full_problem_round_trips_through_json() {
    let json = r#"{
        "graph": {
            "vertex_weights": [1, 1, 1, 1, 1],
            "edges": [[0, 1], [1, 2], [2, 3], [3, 4]]
        },
        "backends": [
            { "id": "east", "execution_time": 10.0, "queue_time": 1.0, "capacity": 4 },
            { "id": "west", "execution_time": 14.0, "queue_time": 0.5, "capacity": 4 }
        ],
        "config": {
            "max_qubits_per_subcircuit": 4,
            "num_subcircuits": 2,
            "shots_per_subcircuit": 50,
            "objective_mode": "single_select"
        }
    }"#;
    let problem = Problem::from_json(json).unwrap();
    let plan = solve_problem(&problem).unwrap();

    assert_eq!(plan.partition.cut_count, 1);
    plan.allocation.validate(50).unwrap();

    let serialized = plan.to_json().unwrap();
    assert!(serialized.contains("\"cut_count\": 1"));
}

#[test]
fn sweep_ranks_by_reconstruction_cost() {
    // Capacity large enough for the whole workload: cutting is never worth
    // a 16x reconstruction blowup, so one subcircuit must win the sweep.
    let graph = WorkloadGraph::path(5).unwrap();
    let backends = vec![BackendDescriptor::new("large", 10.0, 1.0, 8)];
    let config = PlannerConfig {
        objective_mode: ObjectiveMode::SingleSelect,
        max_qubits_per_subcircuit: 8,
        num_subcircuits: 1,
        shots_per_subcircuit: 100,
        ..Default::default()
    };
    let planner = CutShotPlanner::new(&graph, &backends, config).unwrap();

    let report = planner.plan_sweep(1..=2, &PowerLaw::default()).unwrap();
    assert_eq!(report.best.partition.cut_count, 0);
    assert!(
        report
            .candidates
            .iter()
            .all(|c| c.score >= report.candidates[0].score)
    );
}

#[test]
fn random_forward_dags_partition_consistently() {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..3 {
        let n = rng.gen_range(4..7);
        let mut edges = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if rng.gen_bool(0.4) {
                    edges.push((i, j));
                }
            }
        }
        let graph = WorkloadGraph::new(vec![1; n], edges).unwrap();

        match partition(&graph, 4, 3) {
            Ok(plan) => {
                plan.validate(4).unwrap();
                for subcircuit in plan.non_empty() {
                    assert!(subcircuit.aggregates.consistent());
                }
            }
            // Dense draws can exceed the capacity once init qubits pile up.
            Err(PlanError::Infeasible { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}

#[test]
fn expired_time_limit_without_incumbent_is_reported() {
    let graph = WorkloadGraph::path(5).unwrap();
    let backends = reference_fleet();
    let config = PlannerConfig {
        objective_mode: ObjectiveMode::SingleSelect,
        max_qubits_per_subcircuit: 4,
        num_subcircuits: 2,
        shots_per_subcircuit: 100,
        solver_time_limit: Some(0.0),
        ..Default::default()
    };
    let planner = CutShotPlanner::new(&graph, &backends, config).unwrap();
    // The sweep's deadline is already spent before the first candidate.
    let err = planner.plan_sweep(1..=2, &PowerLaw::default()).unwrap_err();
    assert!(matches!(err, PlanError::SolverLimit(_)));
}
