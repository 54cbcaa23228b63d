//! Gemini-powered decision capability
//!
//! Routing, planning and synthesis prompts for the hosted model.

use async_trait::async_trait;
use serde::Deserialize;

use crate::decision::{match_option, Decider};
use crate::error::SupervisorError;
use crate::gemini::{strip_code_fence, GeminiClient};
use crate::models::{ConversationState, PlannedStep, StepResult, FINISH};
use crate::Result;

pub struct GeminiDecider {
    client: GeminiClient,
    label: String,
}

impl GeminiDecider {
    pub fn new(client: GeminiClient) -> Self {
        let label = format!("gemini:{}", client.model());
        Self { client, label }
    }

    fn routing_system_prompt(options: &[String]) -> String {
        let members: Vec<&str> = options
            .iter()
            .map(String::as_str)
            .filter(|o| *o != FINISH)
            .collect();

        if options.iter().any(|o| o == FINISH) {
            format!(
                "You are a supervisor managing a team of specialists: {}. \
                 Route the user's request to the right specialist. \
                 Once a specialist has answered, your task is complete. \
                 Always choose {} if the history already contains an answer from a specialist.",
                members.join(", "),
                FINISH
            )
        } else {
            format!(
                "You pick the single best tool for the user's latest request. Tools: {}.",
                members.join(", ")
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlanResponse {
    steps: Vec<PlannedStep>,
}

#[async_trait]
impl Decider for GeminiDecider {
    fn name(&self) -> &str {
        &self.label
    }

    async fn choose(&self, history: &ConversationState, options: &[String]) -> Result<String> {
        let system = Self::routing_system_prompt(options);
        let prompt = format!(
            "CONVERSATION:\n{}\n\nAnalyse the conversation. Who should act next, or is the task done? \
             Choose one of: {}.\nReply with the label only.",
            history.transcript(),
            options.join(", ")
        );

        let response = self.client.generate(&system, &prompt).await?;
        match_option(&response, options)
    }

    async fn plan_objective(&self, objective: &str, agents: &[String]) -> Result<Vec<PlannedStep>> {
        let system = "You are a planning engine. Return ONLY valid JSON, no explanation text.";
        let prompt = format!(
            r#"Build a step-by-step plan for the task below.
Each step must be a self-contained query for one specialist.
Do not add unnecessary steps. The result of the last step should complete the answer.

Available specialists: {}

TASK:
{}

JSON format:
{{
  "steps": [
    {{ "agent": "<specialist name>", "query": "<self-contained query>" }}
  ]
}}
"#,
            agents.join(", "),
            objective
        );

        let response = self.client.generate(system, &prompt).await?;
        parse_plan_response(&response)
    }

    async fn synthesize(&self, objective: &str, steps: &[StepResult]) -> Result<String> {
        let system = "You are a helpful assistant. Combine the specialists' results into one clear, \
                      friendly answer for the user.";
        let results = serde_json::to_string_pretty(steps)?;
        let prompt = format!(
            "The user's original request was: {}\n\nResults gathered by the specialists:\n{}\n\n\
             Combine all of this into one final answer.",
            objective, results
        );

        self.client.generate(system, &prompt).await
    }
}

/// Parse the structured plan returned by the model
fn parse_plan_response(response: &str) -> Result<Vec<PlannedStep>> {
    let parsed: PlanResponse = serde_json::from_str(strip_code_fence(response)).map_err(|e| {
        SupervisorError::DecisionUnavailable(format!(
            "Failed to parse plan response: {} | raw={}",
            e, response
        ))
    })?;

    Ok(parsed.steps)
}
