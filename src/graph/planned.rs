//! Plan-then-execute graph
//!
//! PLANNING -> EXECUTING_STEP* -> RESPONDING -> DONE. Every node entry counts
//! as one cycle against the recursion limit.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::GraphConfig;
use crate::decision::Decider;
use crate::error::SupervisorError;
use crate::execution::StepExecutor;
use crate::graph::count_cycle;
use crate::models::{ExecutionPlan, GraphRunState, Phase, RunOutcome, StepResult, Turn};
use crate::planner::ObjectivePlanner;
use crate::retry;
use crate::Result;

pub struct PlannedGraph {
    planner: ObjectivePlanner,
    executor: StepExecutor,
    responder: Arc<dyn Decider>,
    config: GraphConfig,
}

impl PlannedGraph {
    pub fn new(
        planner: ObjectivePlanner,
        executor: StepExecutor,
        responder: Arc<dyn Decider>,
        config: GraphConfig,
    ) -> Self {
        Self {
            planner,
            executor,
            responder,
            config,
        }
    }

    pub async fn invoke(&self, session_id: &str, query: &str) -> Result<RunOutcome> {
        info!(session_id, %query, "Planned run started");
        let mut state = GraphRunState::new(session_id, query, Phase::Planning);

        loop {
            if state.phase != Phase::Done {
                count_cycle(&mut state, self.config.recursion_limit)?;
            }

            match state.phase.clone() {
                Phase::Planning => {
                    let objective = state.objective().to_string();
                    state.plan = match self.planner.plan(&objective).await {
                        Ok(plan) => plan,
                        Err(e) if !e.is_fatal_to_run() => {
                            warn!(session_id, error = %e, "Planning failed, answering without a plan");
                            state.last_error = Some(e.to_string());
                            ExecutionPlan::default()
                        }
                        Err(e) => return Err(e),
                    };

                    if state.plan.is_empty() {
                        state.enter(Phase::Responding);
                    } else {
                        state.enter(Phase::ExecutingStep);
                    }
                }

                Phase::ExecutingStep => {
                    if let Some(step) = self.executor.execute_next(&mut state).await? {
                        state
                            .conversation
                            .push(Turn::specialist(step.agent.clone(), step.result.clone()));
                    }

                    if state.plan.is_empty() {
                        state.enter(Phase::Responding);
                    }
                }

                Phase::Responding => {
                    let answer = self.respond(&mut state).await;
                    state.conversation.push(Turn::supervisor(answer.clone()));
                    state.response = Some(answer);
                    state.enter(Phase::Done);
                }

                Phase::Done => {
                    let answer = state.response.clone().unwrap_or_default();
                    info!(
                        session_id,
                        cycles = state.cycles,
                        steps = state.past_steps.len(),
                        "Planned run completed"
                    );
                    return Ok(RunOutcome::Completed { answer, state });
                }

                other => {
                    return Err(SupervisorError::InvalidInput(format!(
                        "phase {:?} belongs to the reactive graph",
                        other
                    )));
                }
            }
        }
    }

    /// Synthesized answer. A responder outage falls back to the raw step
    /// results so the caller still gets something.
    async fn respond(&self, state: &mut GraphRunState) -> String {
        let objective = state.objective().to_string();
        let decider = self.responder.name().to_string();

        let synthesized = retry::with_timeout(
            self.config.decision_timeout,
            self.responder.synthesize(&objective, &state.past_steps),
            |ms| SupervisorError::DecisionUnavailable(format!("{} timed out after {} ms", decider, ms)),
        )
        .await;

        match synthesized {
            Ok(answer) => answer,
            Err(e) => {
                warn!(session_id = %state.session_id, error = %e, "Synthesis failed, returning raw results");
                state.last_error = Some(e.to_string());
                plain_summary(&objective, &state.past_steps)
            }
        }
    }
}

fn plain_summary(objective: &str, steps: &[StepResult]) -> String {
    if steps.is_empty() {
        return format!("Sorry, I could not find an answer to \"{}\".", objective);
    }
    steps
        .iter()
        .map(|s| s.result.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
