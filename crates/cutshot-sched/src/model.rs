//! Thin MILP construction layer over `good_lp`.
//!
//! Every optimization run owns one [`MilpBuilder`]: decision variables,
//! constraints, and objective terms are accumulated into it, then the whole
//! model is handed to the solver in a single blocking call. Nothing here
//! survives between runs.

use std::time::{Duration, Instant};

use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
    default_solver, variable,
};
use tracing::debug;

use crate::error::{ConstraintFamily, PlanError, PlanResult};

/// Sum an iterator of linear terms. The empty sum is the zero expression.
pub fn lp_sum<I, E>(terms: I) -> Expression
where
    I: IntoIterator<Item = E>,
    E: Into<Expression>,
{
    terms
        .into_iter()
        .fold(Expression::default(), |acc, term| acc + term.into())
}

/// Accumulates variables, constraints, and objective terms for one solve.
pub struct MilpBuilder {
    vars: ProblemVariables,
    constraints: Vec<Constraint>,
    objective: Expression,
    num_vars: usize,
}

impl MilpBuilder {
    /// Start an empty minimization model.
    pub fn new() -> Self {
        Self {
            vars: ProblemVariables::new(),
            constraints: Vec::new(),
            objective: Expression::default(),
            num_vars: 0,
        }
    }

    /// Add a binary decision variable.
    pub fn binary(&mut self) -> Variable {
        self.num_vars += 1;
        self.vars.add(variable().binary())
    }

    /// Add a bounded integer variable.
    pub fn integer(&mut self, min: f64, max: f64) -> Variable {
        self.num_vars += 1;
        self.vars.add(variable().integer().min(min).max(max))
    }

    /// Add a continuous variable bounded below.
    pub fn continuous(&mut self, min: f64) -> Variable {
        self.num_vars += 1;
        self.vars.add(variable().min(min))
    }

    /// Record a constraint.
    pub fn constrain(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Add a term to the (minimized) objective.
    pub fn add_objective(&mut self, term: impl Into<Expression>) {
        self.objective += term.into();
    }

    /// Hand the model to the solver and block until a terminal status.
    ///
    /// `infeasible_family` is attached to the error when the solver proves
    /// infeasibility, so callers can report which constraint family is the
    /// likely cause.
    pub fn solve(self, infeasible_family: ConstraintFamily) -> PlanResult<impl Solution> {
        debug!(
            variables = self.num_vars,
            constraints = self.constraints.len(),
            "solving MILP"
        );

        let mut model = self.vars.minimise(self.objective).using(default_solver);
        for constraint in self.constraints {
            model = model.with(constraint);
        }

        model.solve().map_err(|e| match e {
            ResolutionError::Infeasible => PlanError::Infeasible {
                family: infeasible_family,
                detail: "solver proved the model infeasible".into(),
            },
            ResolutionError::Unbounded => {
                PlanError::SolverFailure("model is unbounded".into())
            }
            other => PlanError::SolverFailure(other.to_string()),
        })
    }
}

impl Default for MilpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock budget shared by the candidate solves of one run.
///
/// The solver backend has no in-solve interruption hook, so the deadline is
/// checked between candidate solves (uniform-count enumeration, sweep
/// pools). An expired deadline returns the best incumbent tagged
/// sub-optimal.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    /// A deadline `limit_seconds` from now, or unbounded when `None`.
    pub fn from_limit(limit_seconds: Option<f64>) -> Self {
        Self {
            expires_at: limit_seconds.map(|s| Instant::now() + Duration::from_secs_f64(s)),
        }
    }

    /// Whether the budget is spent.
    pub fn expired(&self) -> bool {
        self.expires_at.is_some_and(|t| Instant::now() >= t)
    }
}

/// Round a solver value to the nearest non-negative integer.
///
/// Solver outputs for integer variables carry floating-point noise; values
/// are snapped before they enter the reported plan.
pub fn round_count(value: f64) -> u64 {
    value.round().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use good_lp::constraint;

    #[test]
    fn test_trivial_model_solves() {
        let mut builder = MilpBuilder::new();
        let x = builder.continuous(0.0);
        let y = builder.continuous(0.0);
        builder.constrain(constraint!(x + y >= 4.0));
        builder.constrain(constraint!(x - y <= 2.0));
        builder.add_objective(2.0 * x + y);

        let solution = builder.solve(ConstraintFamily::Structure).unwrap();
        // Optimum is x = 0, y = 4.
        assert!(solution.value(x).abs() < 1e-6);
        assert!((solution.value(y) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_binary_knapsack() {
        // Pick the cheaper of two mutually exclusive options.
        let mut builder = MilpBuilder::new();
        let a = builder.binary();
        let b = builder.binary();
        builder.constrain(constraint!(a + b == 1.0));
        builder.add_objective(3.0 * a + 5.0 * b);

        let solution = builder.solve(ConstraintFamily::Structure).unwrap();
        assert!((solution.value(a) - 1.0).abs() < 1e-6);
        assert!(solution.value(b).abs() < 1e-6);
    }

    #[test]
    fn test_infeasible_maps_family() {
        let mut builder = MilpBuilder::new();
        let x = builder.continuous(0.0);
        builder.constrain(constraint!(x >= 3.0));
        builder.constrain(constraint!(x <= 2.0));
        builder.add_objective(x);

        // The ok-type is an opaque solution, so take the error by match.
        match builder.solve(ConstraintFamily::Capacity) {
            Err(PlanError::Infeasible { family, .. }) => {
                assert_eq!(family, ConstraintFamily::Capacity);
            }
            Err(other) => panic!("expected Infeasible, got {other}"),
            Ok(_) => panic!("expected the model to be infeasible"),
        }
    }

    #[test]
    fn test_lp_sum_empty_is_zero() {
        let total = lp_sum(Vec::<Expression>::new());
        // A zero expression added to a model objective is harmless.
        let mut builder = MilpBuilder::new();
        let x = builder.continuous(1.0);
        builder.add_objective(total + x);
        let solution = builder.solve(ConstraintFamily::Structure).unwrap();
        assert!((solution.value(x) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_deadline() {
        assert!(!Deadline::from_limit(None).expired());
        assert!(Deadline::from_limit(Some(0.0)).expired());
        assert!(!Deadline::from_limit(Some(60.0)).expired());
    }

    #[test]
    fn test_round_count() {
        assert_eq!(round_count(4.000001), 4);
        assert_eq!(round_count(3.999999), 4);
        assert_eq!(round_count(-0.0000001), 0);
    }
}
