//! Session-level entry point
//!
//! Picks a routing strategy, wires deciders, lookups and specialists into the
//! matching graph, and exposes the session API: invoke, resume, pending.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::agents::{
    AgentRegistry, ConfidenceScorer, DataCoverageScorer, GeographyAgent, WeatherAgent,
};
use crate::config::{GraphConfig, Settings};
use crate::decision::{Decider, GeminiDecider, KeywordDecider};
use crate::error::SupervisorError;
use crate::execution::StepExecutor;
use crate::gemini::GeminiClient;
use crate::graph::{ExecutionGraph, PlannedGraph};
use crate::lookup::{
    create_geography_registry, Lookup, LookupRegistry, WeatherApiClient, WeatherLookup,
};
use crate::models::{ConfidenceEnvelope, ResumeDecision, RunOutcome};
use crate::planner::ObjectivePlanner;
use crate::router::{FallbackRouter, ReactiveRouter, Router};
use crate::state::{CheckpointStore, InMemoryCheckpointStore};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One decider, reactive routing
    Reactive,
    /// Primary decider with a secondary on failure
    Fallback,
    /// Plan up front, execute, synthesize
    Planner,
    /// Reactive routing with human review of low-confidence answers
    Hitl,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Reactive,
        Strategy::Fallback,
        Strategy::Planner,
        Strategy::Hitl,
    ];

    pub fn description(&self) -> &'static str {
        match self {
            Strategy::Reactive => "supervisor picks a specialist each turn",
            Strategy::Fallback => "supervisor with automatic model downgrade",
            Strategy::Planner => "plan all steps first, then execute them",
            Strategy::Hitl => "supervisor with human review of uncertain answers",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::Reactive => "reactive",
            Strategy::Fallback => "fallback",
            Strategy::Planner => "planner",
            Strategy::Hitl => "hitl",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Strategy {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1" | "reactive" | "supervisor" => Ok(Strategy::Reactive),
            "2" | "fallback" => Ok(Strategy::Fallback),
            "3" | "planner" | "plan" => Ok(Strategy::Planner),
            "4" | "hitl" | "human" => Ok(Strategy::Hitl),
            other => Err(SupervisorError::InvalidInput(format!(
                "unknown strategy '{}'",
                other
            ))),
        }
    }
}

/// Everything a graph is built from
pub struct Components {
    pub primary: Arc<dyn Decider>,
    pub secondary: Arc<dyn Decider>,
    pub weather: Arc<dyn Lookup>,
    pub geography: LookupRegistry,
    pub scorer: Arc<dyn ConfidenceScorer>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub config: GraphConfig,
}

impl Components {
    /// Gemini deciders when a key is configured, the keyword heuristic
    /// otherwise. `population` lets the caller inject a flaky lookup.
    pub fn from_settings(settings: &Settings, population: Arc<dyn Lookup>) -> Result<Self> {
        let (primary, secondary) = match &settings.gemini_api_key {
            Some(key) => (
                gemini_decider(key, &settings.primary_model)?,
                gemini_decider(key, &settings.fallback_model)?,
            ),
            None => {
                info!("GEMINI_API_KEY not set, using the offline keyword decider");
                let keyword: Arc<dyn Decider> = Arc::new(KeywordDecider);
                (keyword.clone(), keyword)
            }
        };

        let weather_api = settings
            .weather_api_key
            .as_ref()
            .map(WeatherApiClient::new)
            .transpose()?;

        Ok(Self {
            primary,
            secondary,
            weather: Arc::new(WeatherLookup::new(weather_api)),
            geography: create_geography_registry(&settings.retry, population),
            scorer: Arc::new(DataCoverageScorer::default()),
            checkpoints: Arc::new(InMemoryCheckpointStore::new()),
            config: settings.graph.clone(),
        })
    }
}

fn gemini_decider(api_key: &str, model: &str) -> Result<Arc<dyn Decider>> {
    Ok(Arc::new(GeminiDecider::new(GeminiClient::new(api_key, model)?)))
}

enum Engine {
    Reactive(ExecutionGraph),
    Planned(PlannedGraph),
}

pub struct Orchestrator {
    strategy: Strategy,
    engine: Engine,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl Orchestrator {
    pub fn new(strategy: Strategy, components: Components) -> Self {
        let Components {
            primary,
            secondary,
            weather,
            geography,
            scorer,
            checkpoints,
            config,
        } = components;

        let mut geography_agent = GeographyAgent::new(geography)
            .with_selector(primary.clone())
            .with_timeouts(config.lookup_timeout, config.decision_timeout);
        if strategy == Strategy::Hitl {
            geography_agent = geography_agent.with_confidence(scorer);
        }

        let agents = AgentRegistry::new()
            .with(Arc::new(
                WeatherAgent::new(weather).with_lookup_timeout(config.lookup_timeout),
            ))
            .with(Arc::new(geography_agent));
        let members = agents.names();

        let engine = match strategy {
            Strategy::Planner => Engine::Planned(PlannedGraph::new(
                ObjectivePlanner::new(primary.clone(), members)
                    .with_timeout(config.decision_timeout),
                StepExecutor::new(agents),
                primary,
                config,
            )),
            Strategy::Reactive | Strategy::Hitl => {
                let router: Arc<dyn Router> =
                    Arc::new(ReactiveRouter::new(primary, members).with_config(&config));
                let graph = ExecutionGraph::new(router, agents, checkpoints.clone(), config);
                if strategy == Strategy::Hitl {
                    Engine::Reactive(graph.with_interrupts())
                } else {
                    Engine::Reactive(graph)
                }
            }
            Strategy::Fallback => {
                let router: Arc<dyn Router> = Arc::new(FallbackRouter::new(
                    ReactiveRouter::new(primary, members.clone()).with_config(&config),
                    ReactiveRouter::new(secondary, members).with_config(&config),
                ));
                Engine::Reactive(ExecutionGraph::new(router, agents, checkpoints.clone(), config))
            }
        };

        info!(%strategy, "Orchestrator initialized");
        Self {
            strategy,
            engine,
            checkpoints,
        }
    }

    pub fn from_settings(settings: &Settings, strategy: Strategy, population: Arc<dyn Lookup>) -> Result<Self> {
        Ok(Self::new(strategy, Components::from_settings(settings, population)?))
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub async fn invoke(&self, session_id: &str, query: &str) -> Result<RunOutcome> {
        if query.trim().is_empty() {
            return Err(SupervisorError::InvalidInput("query must not be empty".to_string()));
        }
        match &self.engine {
            Engine::Reactive(graph) => graph.invoke(session_id, query).await,
            Engine::Planned(graph) => graph.invoke(session_id, query).await,
        }
    }

    pub async fn resume(&self, session_id: &str, decision: ResumeDecision) -> Result<RunOutcome> {
        match &self.engine {
            Engine::Reactive(graph) => graph.resume(session_id, decision).await,
            Engine::Planned(_) => Err(SupervisorError::SessionNotFound(session_id.to_string())),
        }
    }

    /// Envelope awaiting review for `session_id`, if the session is suspended.
    pub async fn pending(&self, session_id: &str) -> Result<Option<ConfidenceEnvelope>> {
        Ok(self
            .checkpoints
            .load(session_id)
            .await?
            .and_then(|state| state.pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::FixedConfidence;
    use crate::agents::{GEOGRAPHY_AGENT, WEATHER_AGENT};
    use crate::decision::ScriptedDecider;
    use crate::lookup::PopulationLookup;
    use crate::models::{PlannedStep, FINISH};

    fn components(primary: ScriptedDecider, secondary: ScriptedDecider) -> Components {
        Components {
            primary: Arc::new(primary),
            secondary: Arc::new(secondary),
            weather: Arc::new(WeatherLookup::mock()),
            geography: LookupRegistry::new().with(Arc::new(PopulationLookup)),
            scorer: Arc::new(FixedConfidence(0.5)),
            checkpoints: Arc::new(InMemoryCheckpointStore::new()),
            config: GraphConfig::default(),
        }
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("1".parse::<Strategy>().unwrap(), Strategy::Reactive);
        assert_eq!(" Fallback ".parse::<Strategy>().unwrap(), Strategy::Fallback);
        assert_eq!("plan".parse::<Strategy>().unwrap(), Strategy::Planner);
        assert_eq!("4".parse::<Strategy>().unwrap(), Strategy::Hitl);
        assert!("5".parse::<Strategy>().is_err());

        for strategy in Strategy::ALL {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
    }

    #[tokio::test]
    async fn test_reactive_session() {
        let orchestrator = Orchestrator::new(
            Strategy::Reactive,
            components(
                ScriptedDecider::new("primary").then_choose(WEATHER_AGENT),
                ScriptedDecider::new("secondary"),
            ),
        );

        let outcome = orchestrator.invoke("s1", "weather in London").await.unwrap();
        assert!(outcome.answer().unwrap().contains("London"));
        assert!(orchestrator.invoke("s1", "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_hitl_session_pending_then_resumed() {
        let orchestrator = Orchestrator::new(
            Strategy::Hitl,
            components(
                ScriptedDecider::new("primary").then_choose(GEOGRAPHY_AGENT).otherwise(FINISH),
                ScriptedDecider::new("secondary"),
            ),
        );

        let outcome = orchestrator.invoke("s1", "population of Paris").await.unwrap();
        assert!(outcome.is_suspended());

        let pending = orchestrator.pending("s1").await.unwrap().unwrap();
        assert_eq!(pending.confidence, 0.5);
        assert!(orchestrator.pending("other").await.unwrap().is_none());

        let resumed = orchestrator
            .resume("s1", ResumeDecision::Approve)
            .await
            .unwrap();
        assert_eq!(resumed.answer(), Some("Population of Paris: ~2.1 million"));
        assert!(orchestrator.pending("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_hitl_never_suspends() {
        let orchestrator = Orchestrator::new(
            Strategy::Fallback,
            components(
                ScriptedDecider::unavailable("primary"),
                ScriptedDecider::new("secondary").then_choose(GEOGRAPHY_AGENT),
            ),
        );

        let outcome = orchestrator.invoke("s1", "population of Paris").await.unwrap();
        assert!(!outcome.is_suspended());
        assert_eq!(outcome.answer(), Some("Population of Paris: ~2.1 million"));
    }

    #[tokio::test]
    async fn test_planner_session() {
        let planner = ScriptedDecider::new("primary").with_plan(vec![
            PlannedStep::new(WEATHER_AGENT, "Paris"),
            PlannedStep::new(GEOGRAPHY_AGENT, "Paris"),
        ]);
        let orchestrator =
            Orchestrator::new(Strategy::Planner, components(planner, ScriptedDecider::new("secondary")));

        let outcome = orchestrator.invoke("s1", "Paris overview").await.unwrap();
        assert_eq!(outcome.state().past_steps.len(), 2);

        let err = orchestrator
            .resume("s1", ResumeDecision::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::SessionNotFound(_)));
    }
}
