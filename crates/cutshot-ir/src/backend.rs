//! Backend (QPU) descriptors.
//!
//! A descriptor captures the externally-estimated metrics of one execution
//! backend for the duration of a single optimization run. Descriptors are
//! immutable: adjusting a metric means constructing a new descriptor, never
//! mutating a shared one.

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};

/// Static metrics of one execution backend.
///
/// `execution_time` is the estimate for running a subcircuit's *full* shot
/// budget on this backend; when the budget is split, a backend's share of
/// the load scales that estimate proportionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Stable identifier, unique within one run.
    pub id: String,
    /// Execution-time estimate for a full shot budget, in seconds.
    pub execution_time: f64,
    /// Queue-delay estimate, in seconds.
    pub queue_time: f64,
    /// Maximum number of qubits this backend can host.
    pub capacity: u32,
    /// Price per shot, if the backend is billed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_shot: Option<f64>,
    /// Reliability score in `[0, 1]`, higher is better.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reliability: Option<f64>,
    /// Compliance region tag (e.g. "eu-west").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl BackendDescriptor {
    /// Create a descriptor from the three mandatory metrics.
    pub fn new(
        id: impl Into<String>,
        execution_time: f64,
        queue_time: f64,
        capacity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            execution_time,
            queue_time,
            capacity,
            price_per_shot: None,
            reliability: None,
            region: None,
        }
    }

    /// Return a copy with a price-per-shot attached.
    pub fn with_price(mut self, price_per_shot: f64) -> Self {
        self.price_per_shot = Some(price_per_shot);
        self
    }

    /// Return a copy with a reliability score attached.
    pub fn with_reliability(mut self, reliability: f64) -> Self {
        self.reliability = Some(reliability);
        self
    }

    /// Return a copy with a compliance region attached.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Queue time plus full-budget execution time.
    pub fn base_latency(&self) -> f64 {
        self.queue_time + self.execution_time
    }

    /// Check metric domains.
    pub fn validate(&self) -> IrResult<()> {
        let fail = |detail: &str| {
            Err(IrError::InvalidBackend {
                id: self.id.clone(),
                detail: detail.to_string(),
            })
        };

        if self.id.is_empty() {
            return fail("empty id");
        }
        if !self.execution_time.is_finite() || self.execution_time < 0.0 {
            return fail("execution_time must be finite and non-negative");
        }
        if !self.queue_time.is_finite() || self.queue_time < 0.0 {
            return fail("queue_time must be finite and non-negative");
        }
        if let Some(p) = self.price_per_shot {
            if !p.is_finite() || p < 0.0 {
                return fail("price_per_shot must be finite and non-negative");
            }
        }
        if let Some(r) = self.reliability {
            if !(0.0..=1.0).contains(&r) {
                return fail("reliability must lie in [0, 1]");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_descriptor() {
        let b = BackendDescriptor::new("ibm_nairobi", 300.0, 6.0, 7);
        assert_eq!(b.base_latency(), 306.0);
        b.validate().unwrap();
    }

    #[test]
    fn test_with_builders_do_not_mutate_original() {
        let base = BackendDescriptor::new("sim", 10.0, 1.0, 20);
        let tagged = base.clone().with_region("eu-west").with_reliability(0.99);
        assert!(base.region.is_none());
        assert_eq!(tagged.region.as_deref(), Some("eu-west"));
        assert_eq!(tagged.reliability, Some(0.99));
    }

    #[test]
    fn test_rejects_bad_reliability() {
        let b = BackendDescriptor::new("sim", 1.0, 0.0, 5).with_reliability(1.5);
        assert!(b.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_queue_time() {
        let b = BackendDescriptor::new("sim", 1.0, -2.0, 5);
        assert!(b.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let b = BackendDescriptor::new("aer", 12.0, 2.0, 200).with_price(0.01);
        let json = serde_json::to_string(&b).unwrap();
        let back: BackendDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(b, back);
        // Absent optional fields are omitted from the wire format.
        assert!(!json.contains("region"));
    }
}
