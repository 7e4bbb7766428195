//! Planner configuration: objective modes, QoS weights, predicates.

use serde::{Deserialize, Serialize};

use crate::backend::BackendDescriptor;
use crate::error::{IrError, IrResult};

/// Which objective variant the optimizer builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveMode {
    /// Exactly one backend per subcircuit; minimize queue + execution time.
    SingleSelect,
    /// Any non-empty subset per subcircuit, shots split evenly; minimize the
    /// worst per-backend latency plus post-processing time.
    JointUniform,
    /// As `JointUniform`, plus price/reliability penalty terms.
    JointQos,
    /// Shot split is itself optimized; subcircuits couple through shared
    /// backends and the makespan.
    JointNonuniform,
}

/// Non-negative weights for the QoS penalty terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QosWeights {
    /// Weight on normalized price.
    pub price_weight: f64,
    /// Weight on `1 - reliability`.
    pub reliability_weight: f64,
}

impl Default for QosWeights {
    fn default() -> Self {
        Self {
            price_weight: 0.0,
            reliability_weight: 0.0,
        }
    }
}

/// Hard eligibility rule excluding backends outright.
///
/// An excluded backend is pinned to zero in the model; exclusion is never a
/// soft penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPredicate {
    /// Only backends whose region is listed remain eligible. Backends with
    /// no region tag are excluded.
    AllowedRegions(Vec<String>),
    /// Backends listed here are excluded by id.
    DenyBackends(Vec<String>),
    /// Backends below the threshold (or without a score) are excluded.
    MinReliability(f64),
}

impl BackendPredicate {
    /// Whether this predicate excludes the given backend.
    pub fn excludes(&self, backend: &BackendDescriptor) -> bool {
        match self {
            Self::AllowedRegions(regions) => match &backend.region {
                Some(r) => !regions.iter().any(|allowed| allowed == r),
                None => true,
            },
            Self::DenyBackends(ids) => ids.iter().any(|id| id == &backend.id),
            Self::MinReliability(min) => backend.reliability.unwrap_or(0.0) < *min,
        }
    }
}

/// Knobs of one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Per-subcircuit qubit capacity bound (`d[c] <= max_qubits_per_subcircuit`).
    pub max_qubits_per_subcircuit: u32,
    /// Maximum number of subcircuits the graph may be split into.
    pub num_subcircuits: usize,
    /// Shot budget each subcircuit must receive.
    pub shots_per_subcircuit: u64,
    /// Objective variant.
    pub objective_mode: ObjectiveMode,
    /// QoS penalty weights (used by the qos/nonuniform modes).
    #[serde(default)]
    pub qos_weights: QosWeights,
    /// Hard backend-exclusion rules.
    #[serde(default)]
    pub predicates: Vec<BackendPredicate>,
    /// In `JointQos` mode, split shots evenly instead of optimizing the split.
    #[serde(default = "default_uniform_split")]
    pub uniform_split: bool,
    /// Wall-clock budget for the whole run, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver_time_limit: Option<f64>,
    /// Weight on the (normalized) cut count in the combined objective.
    #[serde(default = "default_half")]
    pub cut_weight: f64,
    /// Weight on the (normalized) makespan in the combined objective.
    #[serde(default = "default_half")]
    pub time_weight: f64,
    /// Fixed post-processing time added to the latency objectives, in seconds.
    #[serde(default)]
    pub postprocessing_time: f64,
}

fn default_uniform_split() -> bool {
    true
}

fn default_half() -> f64 {
    0.5
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_qubits_per_subcircuit: 4,
            num_subcircuits: 2,
            shots_per_subcircuit: 1024,
            objective_mode: ObjectiveMode::JointNonuniform,
            qos_weights: QosWeights::default(),
            predicates: Vec::new(),
            uniform_split: true,
            solver_time_limit: None,
            cut_weight: 0.5,
            time_weight: 0.5,
            postprocessing_time: 0.0,
        }
    }
}

impl PlannerConfig {
    /// Check field domains. Called before any model is built.
    pub fn validate(&self) -> IrResult<()> {
        let fail = |detail: &str| Err(IrError::InvalidConfig(detail.to_string()));

        if self.max_qubits_per_subcircuit == 0 {
            return fail("max_qubits_per_subcircuit must be positive");
        }
        if self.num_subcircuits == 0 {
            return fail("num_subcircuits must be positive");
        }
        if self.shots_per_subcircuit == 0 {
            return fail("shots_per_subcircuit must be positive");
        }
        if self.cut_weight < 0.0 || self.time_weight < 0.0 {
            return fail("objective weights must be non-negative");
        }
        if self.cut_weight + self.time_weight <= 0.0 {
            return fail("cut_weight + time_weight must be positive");
        }
        if self.qos_weights.price_weight < 0.0 || self.qos_weights.reliability_weight < 0.0 {
            return fail("QoS weights must be non-negative");
        }
        if self.postprocessing_time < 0.0 {
            return fail("postprocessing_time must be non-negative");
        }
        if let Some(limit) = self.solver_time_limit {
            // Zero is allowed: it means "no time left", which reports a
            // solver-limit error instead of being rejected up front.
            if !limit.is_finite() || limit < 0.0 {
                return fail("solver_time_limit must be non-negative");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        PlannerConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_zero_shots() {
        let config = PlannerConfig {
            shots_per_subcircuit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_weight() {
        let config = PlannerConfig {
            cut_weight: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_weight_sum() {
        let config = PlannerConfig {
            cut_weight: 0.0,
            time_weight: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_region_predicate() {
        let pred = BackendPredicate::AllowedRegions(vec!["eu-west".into()]);
        let eu = BackendDescriptor::new("a", 1.0, 1.0, 5).with_region("eu-west");
        let us = BackendDescriptor::new("b", 1.0, 1.0, 5).with_region("us-east");
        let untagged = BackendDescriptor::new("c", 1.0, 1.0, 5);
        assert!(!pred.excludes(&eu));
        assert!(pred.excludes(&us));
        assert!(pred.excludes(&untagged));
    }

    #[test]
    fn test_deny_predicate() {
        let pred = BackendPredicate::DenyBackends(vec!["bad".into()]);
        assert!(pred.excludes(&BackendDescriptor::new("bad", 1.0, 1.0, 5)));
        assert!(!pred.excludes(&BackendDescriptor::new("good", 1.0, 1.0, 5)));
    }

    #[test]
    fn test_min_reliability_predicate() {
        let pred = BackendPredicate::MinReliability(0.9);
        let good = BackendDescriptor::new("a", 1.0, 1.0, 5).with_reliability(0.95);
        let bad = BackendDescriptor::new("b", 1.0, 1.0, 5).with_reliability(0.5);
        let unscored = BackendDescriptor::new("c", 1.0, 1.0, 5);
        assert!(!pred.excludes(&good));
        assert!(pred.excludes(&bad));
        assert!(pred.excludes(&unscored));
    }

    #[test]
    fn test_objective_mode_wire_names() {
        let json = serde_json::to_string(&ObjectiveMode::JointNonuniform).unwrap();
        assert_eq!(json, "\"joint_nonuniform\"");
        let mode: ObjectiveMode = serde_json::from_str("\"single_select\"").unwrap();
        assert_eq!(mode, ObjectiveMode::SingleSelect);
    }
}
