//! Confidence gate for human review
//!
//! Reads a specialist turn as a `ConfidenceEnvelope`. Anything that is not an
//! envelope passes. An envelope scoring strictly below the threshold asks the
//! graph to suspend.

use tracing::{debug, info};

use crate::config::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::models::{ConfidenceEnvelope, Turn};

#[derive(Debug, Clone, PartialEq)]
pub enum GateVerdict {
    Continue,
    Suspend(ConfidenceEnvelope),
}

#[derive(Debug, Clone, Copy)]
pub struct InterruptGate {
    threshold: f64,
}

impl Default for InterruptGate {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl InterruptGate {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn check(&self, turn: &Turn) -> GateVerdict {
        let Some(envelope) = ConfidenceEnvelope::parse(&turn.text) else {
            debug!("No confidence envelope, continuing");
            return GateVerdict::Continue;
        };

        if envelope.confidence < self.threshold {
            info!(
                tool = %envelope.tool,
                confidence = envelope.confidence,
                threshold = self.threshold,
                "Confidence below threshold"
            );
            GateVerdict::Suspend(envelope)
        } else {
            GateVerdict::Continue
        }
    }
}
