//! Post-hoc reconstruction cost models.
//!
//! Cutting an edge multiplies classical reconstruction work, so two plans
//! with similar solver objectives can differ wildly in downstream effort.
//! These models score that effort from a plan's cut count; the sweep uses
//! the score to rank candidate partition counts. The cost never enters the
//! MILP itself.

use serde::{Deserialize, Serialize};

/// Scores the classical reconstruction effort implied by a cut count.
pub trait ReconstructionCost {
    /// Cost of reconstructing the output distribution after `cut_count`
    /// wire cuts. Must be non-decreasing in `cut_count`.
    fn evaluate(&self, cut_count: u32) -> f64;
}

/// Exponential growth in the cut count: `base^cuts`.
///
/// Wire cutting expands each cut into a fixed set of measurement and
/// preparation channels, so reconstruction work compounds per cut.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PowerLaw {
    /// Channels per cut.
    pub base: f64,
}

impl PowerLaw {
    pub fn new(base: f64) -> Self {
        Self { base }
    }
}

impl Default for PowerLaw {
    /// Sixteen channels per cut, the expansion of a single wire cut under
    /// the standard measure-and-prepare decomposition.
    fn default() -> Self {
        Self { base: 16.0 }
    }
}

impl ReconstructionCost for PowerLaw {
    fn evaluate(&self, cut_count: u32) -> f64 {
        self.base.powi(cut_count as i32)
    }
}

/// Linear growth: `slope * cuts`. Useful when reconstruction is batched
/// and only the bookkeeping scales with the cut count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Linear {
    pub slope: f64,
}

impl ReconstructionCost for Linear {
    fn evaluate(&self, cut_count: u32) -> f64 {
        self.slope * f64::from(cut_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_law_compounds() {
        let cost = PowerLaw::default();
        assert!((cost.evaluate(0) - 1.0).abs() < 1e-9);
        assert!((cost.evaluate(1) - 16.0).abs() < 1e-9);
        assert!((cost.evaluate(2) - 256.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_scales() {
        let cost = Linear { slope: 2.5 };
        assert!((cost.evaluate(0)).abs() < 1e-9);
        assert!((cost.evaluate(4) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_trait_object_usable() {
        let models: Vec<Box<dyn ReconstructionCost>> =
            vec![Box::new(PowerLaw::default()), Box::new(Linear { slope: 1.0 })];
        for model in &models {
            assert!(model.evaluate(3) >= model.evaluate(2));
        }
    }
}
