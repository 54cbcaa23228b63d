//! Up-front objective planning
//!
//! Called once per planner run. The decider proposes (agent, query) steps,
//! then every step is re-checked against the known specialists before any
//! of them runs. No replanning.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::GraphConfig;
use crate::decision::Decider;
use crate::error::SupervisorError;
use crate::models::{ExecutionPlan, PlannedStep};
use crate::retry;
use crate::Result;

/// Maximum steps allowed per plan
const MAX_STEPS_PER_PLAN: usize = 50;

pub struct ObjectivePlanner {
    decider: Arc<dyn Decider>,
    agents: Vec<String>,
    timeout: Duration,
}

impl ObjectivePlanner {
    pub fn new(decider: Arc<dyn Decider>, agents: Vec<String>) -> Self {
        Self {
            decider,
            agents,
            timeout: GraphConfig::default().decision_timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn plan(&self, objective: &str) -> Result<ExecutionPlan> {
        let decider = self.decider.name().to_string();
        let steps = retry::with_timeout(
            self.timeout,
            self.decider.plan_objective(objective, &self.agents),
            |ms| SupervisorError::DecisionUnavailable(format!("{} timed out after {} ms", decider, ms)),
        )
        .await?;

        let steps = self.validate(objective, steps)?;

        info!(decider = %decider, steps = steps.len(), "Plan created");
        for (i, step) in steps.iter().enumerate() {
            debug!(order = i + 1, agent = %step.agent, query = %step.query, "Planned step");
        }

        Ok(ExecutionPlan::new(steps))
    }

    /// Reject unknown agents and oversized plans. Blank queries inherit the
    /// objective.
    pub fn validate(&self, objective: &str, steps: Vec<PlannedStep>) -> Result<Vec<PlannedStep>> {
        if steps.len() > MAX_STEPS_PER_PLAN {
            return Err(SupervisorError::InvalidPlan(format!(
                "Plan exceeds maximum allowed steps ({})",
                MAX_STEPS_PER_PLAN
            )));
        }

        steps
            .into_iter()
            .map(|step| {
                if !self.agents.iter().any(|a| *a == step.agent) {
                    return Err(SupervisorError::PlanStepAgentNotFound(step.agent));
                }
                if step.query.trim().is_empty() {
                    return Ok(PlannedStep::new(step.agent, objective));
                }
                Ok(step)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{KeywordDecider, ScriptedDecider};

    fn agents() -> Vec<String> {
        vec!["WeatherAgent".to_string(), "GeographyAgent".to_string()]
    }

    #[tokio::test]
    async fn test_plan_keeps_order() {
        let decider = ScriptedDecider::new("stub").with_plan(vec![
            PlannedStep::new("WeatherAgent", "Paris"),
            PlannedStep::new("GeographyAgent", "Paris"),
        ]);
        let planner = ObjectivePlanner::new(Arc::new(decider), agents());

        let plan = planner.plan("weather and population of Paris").await.unwrap();
        let order: Vec<&str> = plan.iter().map(|s| s.agent.as_str()).collect();
        assert_eq!(order, vec!["WeatherAgent", "GeographyAgent"]);
    }

    #[tokio::test]
    async fn test_unknown_agent_rejected() {
        let decider = ScriptedDecider::new("stub").with_plan(vec![
            PlannedStep::new("WeatherAgent", "Paris"),
            PlannedStep::new("StockAgent", "AAPL"),
        ]);
        let planner = ObjectivePlanner::new(Arc::new(decider), agents());

        match planner.plan("anything").await {
            Err(SupervisorError::PlanStepAgentNotFound(name)) => assert_eq!(name, "StockAgent"),
            other => panic!("unexpected: {:?}", other.map(|p| p.len())),
        }
    }

    #[test]
    fn test_blank_query_inherits_objective() {
        let planner = ObjectivePlanner::new(Arc::new(KeywordDecider), agents());
        let steps = planner
            .validate("traffic in Tokyo", vec![PlannedStep::new("GeographyAgent", "  ")])
            .unwrap();
        assert_eq!(steps[0].query, "traffic in Tokyo");
    }

    #[test]
    fn test_oversized_plan_rejected() {
        let planner = ObjectivePlanner::new(Arc::new(KeywordDecider), agents());
        let steps = vec![PlannedStep::new("WeatherAgent", "Paris"); MAX_STEPS_PER_PLAN + 1];
        assert!(matches!(
            planner.validate("x", steps),
            Err(SupervisorError::InvalidPlan(_))
        ));
    }
}
