//! Threshold checks evaluated on task-reported metrics.

use serde::Serialize;

/// Which side of the threshold is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    /// Acceptable when `value >= threshold`.
    AtLeast,
    /// Acceptable when `value <= threshold`.
    AtMost,
}

/// A metric compared against a caller-supplied acceptance threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityGate {
    pub metric: &'static str,
    pub value: f64,
    pub threshold: f64,
    pub bound: Bound,
}

impl QualityGate {
    pub fn at_least(metric: &'static str, value: f64, threshold: f64) -> Self {
        Self {
            metric,
            value,
            threshold,
            bound: Bound::AtLeast,
        }
    }

    pub fn at_most(metric: &'static str, value: f64, threshold: f64) -> Self {
        Self {
            metric,
            value,
            threshold,
            bound: Bound::AtMost,
        }
    }

    /// Whether the metric misses the threshold. Strict comparison: a value
    /// equal to the threshold passes.
    pub fn fires(&self) -> bool {
        match self.bound {
            Bound::AtLeast => self.value < self.threshold,
            Bound::AtMost => self.value > self.threshold,
        }
    }

    pub fn passes(&self) -> bool {
        !self.fires()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_boundary_is_strict() {
        assert!(QualityGate::at_least("passRate", 39.0, 40.0).fires());
        assert!(!QualityGate::at_least("passRate", 40.0, 40.0).fires());
        assert!(!QualityGate::at_least("passRate", 40.1, 40.0).fires());
    }

    #[test]
    fn test_maximum_boundary_is_strict() {
        assert!(QualityGate::at_most("criticalVulnerabilities", 1.0, 0.0).fires());
        assert!(!QualityGate::at_most("criticalVulnerabilities", 0.0, 0.0).fires());
    }

    #[test]
    fn test_evaluation_is_pure() {
        let gate = QualityGate::at_least("coverageScore", 69.5, 70.0);
        assert_eq!(gate.fires(), gate.clone().fires());
        assert!(!gate.passes());
    }
}
