//! Execution graphs
//!
//! `ExecutionGraph` is the reactive state machine:
//!
//! ROUTING -> RUNNING_SPECIALIST -> (CHECKING) -> ROUTING ... -> DONE
//!
//! with CHECKING able to park the run in SUSPENDED until `resume`.
//! `PlannedGraph` (see `planned`) is the plan-then-execute variant.
//!
//! Each run owns its `GraphRunState`. The only thing shared between runs is
//! the checkpoint store, keyed by session id.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::agents::AgentRegistry;
use crate::config::GraphConfig;
use crate::error::SupervisorError;
use crate::interrupt::{GateVerdict, InterruptGate};
use crate::models::{ConfidenceEnvelope, GraphRunState, Phase, ResumeDecision, Route, RunOutcome, Turn};
use crate::router::Router;
use crate::state::CheckpointStore;
use crate::Result;

pub mod planned;

pub use planned::PlannedGraph;

/// Count one cycle and enforce the recursion limit.
pub(crate) fn count_cycle(state: &mut GraphRunState, limit: u32) -> Result<()> {
    state.cycles += 1;
    if state.cycles > limit {
        error!(
            session_id = %state.session_id,
            cycles = state.cycles,
            limit,
            "Recursion limit exceeded"
        );
        return Err(SupervisorError::GraphRecursionExceeded { limit });
    }
    Ok(())
}

/// Text of the last turn, unwrapped if it is a confidence envelope.
pub(crate) fn final_answer(state: &GraphRunState) -> String {
    let Some(last) = state.conversation.last() else {
        return String::new();
    };
    match ConfidenceEnvelope::parse(&last.text) {
        Some(envelope) => envelope.content,
        None => last.text.clone(),
    }
}

pub struct ExecutionGraph {
    router: Arc<dyn Router>,
    agents: AgentRegistry,
    gate: Option<InterruptGate>,
    checkpoints: Arc<dyn CheckpointStore>,
    config: GraphConfig,
}

impl ExecutionGraph {
    pub fn new(
        router: Arc<dyn Router>,
        agents: AgentRegistry,
        checkpoints: Arc<dyn CheckpointStore>,
        config: GraphConfig,
    ) -> Self {
        Self {
            router,
            agents,
            gate: None,
            checkpoints,
            config,
        }
    }

    /// Route confidence-checked specialists through the interrupt gate.
    pub fn with_interrupts(mut self) -> Self {
        self.gate = Some(InterruptGate::new(self.config.confidence_threshold));
        self
    }

    /// Start a new run for `session_id`. A run still suspended under the
    /// same session is abandoned.
    pub async fn invoke(&self, session_id: &str, query: &str) -> Result<RunOutcome> {
        if self.checkpoints.remove(session_id).await? {
            warn!(session_id, "Abandoning suspended run for new query");
        }

        info!(session_id, router = self.router.name(), %query, "Run started");
        let state = GraphRunState::new(session_id, query, Phase::Routing);
        self.run(state).await
    }

    /// Continue a suspended run with a reviewer decision.
    pub async fn resume(&self, session_id: &str, decision: ResumeDecision) -> Result<RunOutcome> {
        let mut state = self
            .checkpoints
            .take(session_id)
            .await?
            .ok_or_else(|| SupervisorError::SessionNotFound(session_id.to_string()))?;

        let Phase::Suspended { agent } = state.phase.clone() else {
            self.checkpoints.save(&state).await?;
            return Err(SupervisorError::NotSuspended(session_id.to_string()));
        };

        match &decision {
            ResumeDecision::Approve => {}
            ResumeDecision::Edit { payload } => {
                state.conversation.push(Turn::reviewer_edit(&agent, payload.clone()));
            }
            ResumeDecision::Reject { payload } => {
                let text = payload
                    .clone()
                    .unwrap_or_else(|| format!("The reviewer rejected the answer from {}.", agent));
                state.conversation.push(Turn::reviewer_rejection(&agent, text));
            }
        }

        info!(session_id, %agent, ?decision, "Run resumed");

        state.interrupted = false;
        state.pending = None;
        state.resume = Some(decision);
        state.enter(Phase::Routing);

        self.run(state).await
    }

    async fn run(&self, mut state: GraphRunState) -> Result<RunOutcome> {
        loop {
            match state.phase.clone() {
                Phase::Routing => {
                    count_cycle(&mut state, self.config.recursion_limit)?;

                    let route = match self.router.decide(&mut state).await {
                        Ok(route) => route,
                        Err(e) if !e.is_fatal_to_run() => {
                            error!(session_id = %state.session_id, error = %e, "Routing failed, finishing");
                            state.last_error = Some(e.to_string());
                            Route::Finish
                        }
                        Err(e) => return Err(e),
                    };

                    state.next = Some(route.clone());
                    match route {
                        Route::Finish => state.enter(Phase::Done),
                        Route::Agent(target) => state.enter(Phase::RunningSpecialist { target }),
                    }
                }

                Phase::RunningSpecialist { target } => {
                    let Some(agent) = self.agents.get(&target) else {
                        error!(session_id = %state.session_id, %target, "Router chose an unknown specialist");
                        state.last_error = Some(format!("unknown specialist '{}'", target));
                        state.enter(Phase::Done);
                        continue;
                    };

                    let turn = agent.respond(&state.conversation).await?;
                    info!(
                        session_id = %state.session_id,
                        agent = %target,
                        cycle = state.cycles,
                        "Specialist answered"
                    );
                    state.conversation.push(turn);

                    if self.gate.is_some() && agent.checks_confidence() {
                        state.enter(Phase::Checking { agent: target });
                    } else {
                        state.enter(Phase::Routing);
                    }
                }

                Phase::Checking { agent } => {
                    let verdict = match (&self.gate, state.conversation.last()) {
                        (Some(gate), Some(turn)) => gate.check(turn),
                        _ => GateVerdict::Continue,
                    };

                    match verdict {
                        GateVerdict::Continue => state.enter(Phase::Routing),
                        GateVerdict::Suspend(envelope) => {
                            state.interrupted = true;
                            state.pending = Some(envelope.clone());
                            state.enter(Phase::Suspended { agent: agent.clone() });
                            self.checkpoints.save(&state).await?;

                            info!(
                                session_id = %state.session_id,
                                %agent,
                                confidence = envelope.confidence,
                                "Run suspended for review"
                            );
                            return Ok(RunOutcome::Suspended {
                                session_id: state.session_id.clone(),
                                envelope,
                                state,
                            });
                        }
                    }
                }

                Phase::Done => {
                    let answer = final_answer(&state);
                    state.response = Some(answer.clone());
                    info!(
                        session_id = %state.session_id,
                        cycles = state.cycles,
                        model = %state.current_model,
                        "Run completed"
                    );
                    return Ok(RunOutcome::Completed { answer, state });
                }

                Phase::Suspended { .. } => {
                    return Err(SupervisorError::InvalidInput(format!(
                        "session '{}' is suspended, resume it instead",
                        state.session_id
                    )));
                }

                Phase::Planning | Phase::ExecutingStep | Phase::Responding => {
                    return Err(SupervisorError::InvalidInput(format!(
                        "phase {:?} belongs to the planner graph",
                        state.phase
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{
        FixedConfidence, GeographyAgent, SpecialistAgent, WeatherAgent, GEOGRAPHY_AGENT,
        WEATHER_AGENT,
    };
    use crate::decision::ScriptedDecider;
    use crate::lookup::{LookupRegistry, PopulationLookup};
    use crate::models::{ConversationState, ModelTier, Speaker, FINISH};
    use crate::router::{FallbackRouter, ReactiveRouter};
    use crate::state::InMemoryCheckpointStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps a specialist and counts its invocations.
    struct Counted {
        inner: Arc<dyn SpecialistAgent>,
        calls: AtomicUsize,
    }

    impl Counted {
        fn new(inner: Arc<dyn SpecialistAgent>) -> Arc<Self> {
            Arc::new(Self {
                inner,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpecialistAgent for Counted {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn checks_confidence(&self) -> bool {
            self.inner.checks_confidence()
        }

        async fn respond(&self, state: &ConversationState) -> Result<Turn> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.respond(state).await
        }
    }

    fn members() -> Vec<String> {
        vec![WEATHER_AGENT.to_string(), GEOGRAPHY_AGENT.to_string()]
    }

    fn low_confidence_geography() -> Arc<Counted> {
        Counted::new(Arc::new(
            GeographyAgent::new(LookupRegistry::new().with(Arc::new(PopulationLookup)))
                .with_confidence(Arc::new(FixedConfidence(0.4))),
        ))
    }

    fn graph(
        decider: Arc<ScriptedDecider>,
        agents: AgentRegistry,
        store: Arc<InMemoryCheckpointStore>,
        config: GraphConfig,
    ) -> ExecutionGraph {
        let router = Arc::new(ReactiveRouter::new(decider, members()).with_config(&config));
        ExecutionGraph::new(router, agents, store, config)
    }

    fn default_agents() -> AgentRegistry {
        AgentRegistry::new()
            .with(Arc::new(WeatherAgent::mock()))
            .with(Arc::new(GeographyAgent::new(
                LookupRegistry::new().with(Arc::new(PopulationLookup)),
            )))
    }

    #[tokio::test]
    async fn test_immediate_finish_is_one_cycle() {
        let decider = Arc::new(ScriptedDecider::new("stub"));
        let graph = graph(
            decider.clone(),
            default_agents(),
            Arc::new(InMemoryCheckpointStore::new()),
            GraphConfig::default(),
        );

        let outcome = graph.invoke("s1", "test").await.unwrap();
        assert_eq!(outcome.answer(), Some("test"));
        assert_eq!(outcome.state().cycles, 1);
        assert_eq!(outcome.state().conversation.len(), 1);
        assert_eq!(decider.choose_calls(), 1);
    }

    #[tokio::test]
    async fn test_specialist_then_finish() {
        let decider = Arc::new(ScriptedDecider::new("stub").then_choose(WEATHER_AGENT));
        let graph = graph(
            decider,
            default_agents(),
            Arc::new(InMemoryCheckpointStore::new()),
            GraphConfig::default(),
        );

        let outcome = graph.invoke("s1", "weather in Paris").await.unwrap();
        assert!(outcome.answer().unwrap().contains("Paris"));
        assert_eq!(outcome.state().cycles, 2);
        assert_eq!(outcome.state().next, Some(Route::Finish));
        assert_eq!(outcome.state().phase, Phase::Done);
    }

    #[tokio::test]
    async fn test_recursion_limit() {
        let decider = Arc::new(ScriptedDecider::cycling("stub", &[WEATHER_AGENT, GEOGRAPHY_AGENT]));
        let config = GraphConfig {
            recursion_limit: 5,
            ..GraphConfig::default()
        };
        let graph = graph(
            decider.clone(),
            default_agents(),
            Arc::new(InMemoryCheckpointStore::new()),
            config,
        );

        let err = graph.invoke("s1", "weather in Paris").await.unwrap_err();
        assert!(matches!(err, SupervisorError::GraphRecursionExceeded { limit: 5 }));
        // Five routing cycles ran, the sixth was refused before deciding.
        assert_eq!(decider.choose_calls(), 5);
    }

    #[tokio::test]
    async fn test_fallback_run_uses_secondary() {
        let primary = Arc::new(ScriptedDecider::unavailable("primary"));
        let secondary = Arc::new(
            ScriptedDecider::new("secondary")
                .then_choose(WEATHER_AGENT)
                .otherwise(FINISH),
        );
        let router = Arc::new(FallbackRouter::new(
            ReactiveRouter::new(primary.clone(), members()),
            ReactiveRouter::new(secondary.clone(), members()),
        ));
        let graph = ExecutionGraph::new(
            router,
            default_agents(),
            Arc::new(InMemoryCheckpointStore::new()),
            GraphConfig::default(),
        );

        let outcome = graph.invoke("s1", "weather in Tokyo").await.unwrap();
        assert!(outcome.answer().unwrap().contains("Tokyo"));
        assert_eq!(outcome.state().current_model, ModelTier::Secondary);
        assert_eq!(primary.choose_calls(), 1);
        assert_eq!(secondary.choose_calls(), 2);
    }

    #[tokio::test]
    async fn test_decision_outage_finishes_quietly() {
        let graph = graph(
            Arc::new(ScriptedDecider::unavailable("stub")),
            default_agents(),
            Arc::new(InMemoryCheckpointStore::new()),
            GraphConfig::default(),
        );

        let outcome = graph.invoke("s1", "weather in Paris").await.unwrap();
        assert_eq!(outcome.answer(), Some("weather in Paris"));
        assert!(outcome.state().last_error.is_some());
    }

    #[tokio::test]
    async fn test_low_confidence_suspends_and_checkpoints() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let geography = low_confidence_geography();
        let decider = Arc::new(ScriptedDecider::new("stub").then_choose(GEOGRAPHY_AGENT));
        let graph = graph(
            decider,
            AgentRegistry::new().with(geography.clone()),
            store.clone(),
            GraphConfig::default(),
        )
        .with_interrupts();

        let outcome = graph.invoke("s1", "population of Paris").await.unwrap();
        match &outcome {
            RunOutcome::Suspended { session_id, envelope, state } => {
                assert_eq!(session_id, "s1");
                assert_eq!(envelope.confidence, 0.4);
                assert!(state.interrupted);
            }
            other => panic!("expected suspension, got {:?}", other),
        }

        let saved = store.load("s1").await.unwrap().unwrap();
        assert_eq!(
            saved.phase,
            Phase::Suspended {
                agent: GEOGRAPHY_AGENT.to_string()
            }
        );
        assert_eq!(&saved, outcome.state());
    }

    #[tokio::test]
    async fn test_edit_resume_keeps_reviewer_text() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let geography = low_confidence_geography();
        let decider = Arc::new(ScriptedDecider::new("stub").then_choose(GEOGRAPHY_AGENT));
        let graph = graph(
            decider,
            AgentRegistry::new().with(geography.clone()),
            store.clone(),
            GraphConfig::default(),
        )
        .with_interrupts();

        assert!(graph.invoke("s1", "population of Berlin").await.unwrap().is_suspended());
        assert_eq!(geography.calls(), 1);

        let outcome = graph
            .resume(
                "s1",
                ResumeDecision::Edit {
                    payload: "Berlin: 10°C".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(outcome.answer().unwrap().contains("Berlin: 10°C"));
        assert_eq!(geography.calls(), 1);
        assert_eq!(store.len().await, 0);

        let last = outcome.state().conversation.last().unwrap();
        assert_eq!(last.speaker, Speaker::User);
        assert_eq!(last.source_agent.as_deref(), Some(GEOGRAPHY_AGENT));
    }

    #[tokio::test]
    async fn test_approve_resume_returns_envelope_content() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let decider = Arc::new(ScriptedDecider::new("stub").then_choose(GEOGRAPHY_AGENT));
        let graph = graph(
            decider,
            AgentRegistry::new().with(low_confidence_geography()),
            store,
            GraphConfig::default(),
        )
        .with_interrupts();

        graph.invoke("s1", "population of Paris").await.unwrap();
        let outcome = graph.resume("s1", ResumeDecision::Approve).await.unwrap();
        assert_eq!(outcome.answer(), Some("Population of Paris: ~2.1 million"));
        assert_eq!(outcome.state().resume, Some(ResumeDecision::Approve));
    }

    #[tokio::test]
    async fn test_reject_appends_supervisor_turn() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let decider = Arc::new(ScriptedDecider::new("stub").then_choose(GEOGRAPHY_AGENT));
        let graph = graph(
            decider,
            AgentRegistry::new().with(low_confidence_geography()),
            store,
            GraphConfig::default(),
        )
        .with_interrupts();

        graph.invoke("s1", "population of Paris").await.unwrap();
        let outcome = graph
            .resume("s1", ResumeDecision::Reject { payload: None })
            .await
            .unwrap();

        let last = outcome.state().conversation.last().unwrap();
        assert_eq!(last.speaker, Speaker::Supervisor);
        assert!(last.text.contains("rejected"));
    }

    #[tokio::test]
    async fn test_resume_errors() {
        let graph = graph(
            Arc::new(ScriptedDecider::new("stub")),
            default_agents(),
            Arc::new(InMemoryCheckpointStore::new()),
            GraphConfig::default(),
        );

        let err = graph.resume("missing", ResumeDecision::Approve).await.unwrap_err();
        assert!(matches!(err, SupervisorError::SessionNotFound(_)));
    }

    /// Store that hands control back to the scheduler before every call.
    struct YieldingStore {
        inner: InMemoryCheckpointStore,
    }

    #[async_trait]
    impl CheckpointStore for YieldingStore {
        async fn save(&self, state: &GraphRunState) -> Result<()> {
            tokio::task::yield_now().await;
            self.inner.save(state).await
        }

        async fn load(&self, session_id: &str) -> Result<Option<GraphRunState>> {
            tokio::task::yield_now().await;
            self.inner.load(session_id).await
        }

        async fn remove(&self, session_id: &str) -> Result<bool> {
            tokio::task::yield_now().await;
            self.inner.remove(session_id).await
        }

        async fn take(&self, session_id: &str) -> Result<Option<GraphRunState>> {
            tokio::task::yield_now().await;
            self.inner.take(session_id).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_resumes_accept_one_decision() {
        let store = Arc::new(YieldingStore {
            inner: InMemoryCheckpointStore::new(),
        });
        let config = GraphConfig::default();
        let decider = Arc::new(ScriptedDecider::new("stub").then_choose(GEOGRAPHY_AGENT));
        let router = Arc::new(ReactiveRouter::new(decider, members()).with_config(&config));
        let graph = ExecutionGraph::new(
            router,
            AgentRegistry::new().with(low_confidence_geography()),
            store.clone(),
            config,
        )
        .with_interrupts();

        assert!(graph.invoke("s1", "population of Paris").await.unwrap().is_suspended());

        let (approved, rejected) = tokio::join!(
            graph.resume("s1", ResumeDecision::Approve),
            graph.resume("s1", ResumeDecision::Reject { payload: None }),
        );

        let (winner, loser) = match (approved, rejected) {
            (Ok(outcome), Err(e)) => (outcome, e),
            (Err(e), Ok(outcome)) => (outcome, e),
            (a, b) => panic!("expected exactly one resume to succeed: {:?} / {:?}", a, b),
        };
        assert!(matches!(loser, SupervisorError::SessionNotFound(_)));
        assert!(winner.state().resume.is_some());
        assert_eq!(store.inner.len().await, 0);
    }

    #[tokio::test]
    async fn test_new_query_abandons_suspended_run() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let decider = Arc::new(ScriptedDecider::new("stub").then_choose(GEOGRAPHY_AGENT));
        let graph = graph(
            decider,
            AgentRegistry::new().with(low_confidence_geography()),
            store.clone(),
            GraphConfig::default(),
        )
        .with_interrupts();

        assert!(graph.invoke("s1", "population of Paris").await.unwrap().is_suspended());
        let outcome = graph.invoke("s1", "test").await.unwrap();
        assert_eq!(outcome.answer(), Some("test"));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_without_gate_envelope_is_not_checked() {
        let decider = Arc::new(ScriptedDecider::new("stub").then_choose(GEOGRAPHY_AGENT));
        let graph = graph(
            decider,
            AgentRegistry::new().with(low_confidence_geography()),
            Arc::new(InMemoryCheckpointStore::new()),
            GraphConfig::default(),
        );

        let outcome = graph.invoke("s1", "population of Paris").await.unwrap();
        assert!(!outcome.is_suspended());
        assert_eq!(outcome.answer(), Some("Population of Paris: ~2.1 million"));
    }
}
