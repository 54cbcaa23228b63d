//! Decision capability
//!
//! The language model is treated as an opaque capability that picks one label
//! from a set, decomposes an objective into steps, or writes a final answer.
//! Concrete backends: Gemini, an offline keyword heuristic, and a scripted stub.

use async_trait::async_trait;

use crate::error::SupervisorError;
use crate::gemini::strip_code_fence;
use crate::models::{ConversationState, PlannedStep, StepResult};
use crate::Result;

pub mod gemini;
pub mod keyword;
pub mod scripted;

pub use gemini::GeminiDecider;
pub use keyword::{keyword_match, KeywordDecider};
pub use scripted::ScriptedDecider;

/// Trait for the opaque decision capability
#[async_trait]
pub trait Decider: Send + Sync {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Return exactly one of `options`.
    async fn choose(&self, history: &ConversationState, options: &[String]) -> Result<String>;

    /// Decompose an objective into ordered (agent, query) steps.
    async fn plan_objective(&self, objective: &str, agents: &[String]) -> Result<Vec<PlannedStep>>;

    /// Combine step results into one answer.
    async fn synthesize(&self, objective: &str, steps: &[StepResult]) -> Result<String>;
}

/// Map raw model output onto one of the offered labels.
pub fn match_option(raw: &str, options: &[String]) -> Result<String> {
    let cleaned = strip_code_fence(raw)
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c.is_whitespace());

    if let Some(exact) = options.iter().find(|o| o.as_str() == cleaned) {
        return Ok(exact.clone());
    }

    if let Some(folded) = options.iter().find(|o| o.eq_ignore_ascii_case(cleaned)) {
        return Ok(folded.clone());
    }

    let lowered = cleaned.to_lowercase();
    let mentioned: Vec<&String> = options
        .iter()
        .filter(|o| lowered.contains(&o.to_lowercase()))
        .collect();

    match mentioned.as_slice() {
        [only] => Ok((*only).clone()),
        _ => Err(SupervisorError::DecisionUnavailable(format!(
            "decision '{}' is not one of [{}]",
            raw.trim(),
            options.join(", ")
        ))),
    }
}
