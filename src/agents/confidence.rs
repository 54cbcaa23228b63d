//! Confidence scoring for geography answers

use crate::lookup::reports_missing_data;

/// Score in [0, 1] for a lookup's answer.
pub trait ConfidenceScorer: Send + Sync {
    fn score(&self, lookup: &str, content: &str) -> f64;
}

/// Low score when the lookup answered without data for the place.
#[derive(Debug, Clone, Copy)]
pub struct DataCoverageScorer {
    pub missing: f64,
    pub covered: f64,
}

impl Default for DataCoverageScorer {
    fn default() -> Self {
        Self {
            missing: 0.35,
            covered: 0.9,
        }
    }
}

impl ConfidenceScorer for DataCoverageScorer {
    fn score(&self, _lookup: &str, content: &str) -> f64 {
        if reports_missing_data(content) {
            self.missing
        } else {
            self.covered
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedConfidence(pub f64);

impl ConfidenceScorer for FixedConfidence {
    fn score(&self, _lookup: &str, _content: &str) -> f64 {
        self.0
    }
}
