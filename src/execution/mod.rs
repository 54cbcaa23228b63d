//! Plan step execution
//!
//! Runs the head of an `ExecutionPlan` against its specialist. Each step sees
//! only its own query, never the rest of the run's conversation.

use std::time::Instant;
use tracing::{debug, info};

use crate::agents::AgentRegistry;
use crate::error::SupervisorError;
use crate::models::{ConfidenceEnvelope, ConversationState, GraphRunState, StepResult};
use crate::Result;

pub struct StepExecutor {
    agents: AgentRegistry,
}

impl StepExecutor {
    pub fn new(agents: AgentRegistry) -> Self {
        Self { agents }
    }

    /// Run the next planned step. The head is removed only after the
    /// specialist answered. `None` when the plan is already empty.
    pub async fn execute_next(&self, state: &mut GraphRunState) -> Result<Option<StepResult>> {
        let Some(step) = state.plan.front().cloned() else {
            return Ok(None);
        };

        let agent = self
            .agents
            .get(&step.agent)
            .ok_or_else(|| SupervisorError::PlanStepAgentNotFound(step.agent.clone()))?;

        debug!(
            session_id = %state.session_id,
            agent = %step.agent,
            query = %step.query,
            remaining = state.plan.len(),
            "Executing step"
        );

        let start = Instant::now();
        let turn = agent.respond(&ConversationState::from_query(step.query.clone())).await?;

        // Envelopes are unwrapped; planned runs have no review gate.
        let result = match ConfidenceEnvelope::parse(&turn.text) {
            Some(envelope) if agent.checks_confidence() => envelope.content,
            _ => turn.text,
        };

        state.plan.pop_front();
        let step_result = StepResult {
            agent: step.agent,
            query: step.query,
            result,
        };
        state.past_steps.push(step_result.clone());

        info!(
            session_id = %state.session_id,
            agent = %step_result.agent,
            duration_ms = start.elapsed().as_millis() as u64,
            "Step completed"
        );

        Ok(Some(step_result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{DataCoverageScorer, GeographyAgent, WeatherAgent};
    use crate::lookup::{LookupRegistry, PopulationLookup};
    use crate::models::{ExecutionPlan, Phase, PlannedStep};
    use std::sync::Arc;

    fn executor() -> StepExecutor {
        let geography = GeographyAgent::new(LookupRegistry::new().with(Arc::new(PopulationLookup)))
            .with_confidence(Arc::new(DataCoverageScorer::default()));
        StepExecutor::new(
            AgentRegistry::new()
                .with(Arc::new(WeatherAgent::mock()))
                .with(Arc::new(geography)),
        )
    }

    #[tokio::test]
    async fn test_pops_head_and_logs_result() {
        let mut state = GraphRunState::new("s1", "Paris overview", Phase::ExecutingStep);
        state.plan = ExecutionPlan::new(vec![
            PlannedStep::new("WeatherAgent", "weather in Paris"),
            PlannedStep::new("GeographyAgent", "population of Paris"),
        ]);

        let executor = executor();
        let first = executor.execute_next(&mut state).await.unwrap().unwrap();
        assert_eq!(first.agent, "WeatherAgent");
        assert_eq!(state.plan.len(), 1);

        let second = executor.execute_next(&mut state).await.unwrap().unwrap();
        assert_eq!(second.result, "Population of Paris: ~2.1 million");
        assert!(state.plan.is_empty());
        assert_eq!(state.past_steps.len(), 2);

        assert!(executor.execute_next(&mut state).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_agent_leaves_plan_untouched() {
        let mut state = GraphRunState::new("s1", "x", Phase::ExecutingStep);
        state.plan = ExecutionPlan::new(vec![PlannedStep::new("StockAgent", "AAPL")]);

        let err = executor().execute_next(&mut state).await.unwrap_err();
        assert!(matches!(err, SupervisorError::PlanStepAgentNotFound(_)));
        assert_eq!(state.plan.len(), 1);
        assert!(state.past_steps.is_empty());
    }
}
