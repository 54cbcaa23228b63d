//! Specialist agents
//!
//! A specialist reads the conversation, calls one or more of its lookups
//! and answers with a single `Turn`. Lookup failures never escape a
//! specialist: they come back as an apology in the turn text.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SupervisorError;
use crate::lookup::Lookup;
use crate::models::{ConversationState, Turn};
use crate::retry;
use crate::Result;

pub mod confidence;
pub mod geography;
pub mod weather;

pub use confidence::{ConfidenceScorer, DataCoverageScorer, FixedConfidence};
pub use geography::GeographyAgent;
pub use weather::WeatherAgent;

pub const WEATHER_AGENT: &str = "WeatherAgent";
pub const GEOGRAPHY_AGENT: &str = "GeographyAgent";

/// Trait for all specialists the supervisor can route to
#[async_trait]
pub trait SpecialistAgent: Send + Sync {
    fn name(&self) -> &str;

    /// True when the turn text is a confidence envelope that should pass
    /// through the interrupt gate.
    fn checks_confidence(&self) -> bool {
        false
    }

    async fn respond(&self, state: &ConversationState) -> Result<Turn>;
}

/// Ordered registry of specialists
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn SpecialistAgent>>,
    order: Vec<String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Arc<dyn SpecialistAgent>) {
        let name = agent.name().to_string();
        if self.agents.insert(name.clone(), agent).is_none() {
            self.order.push(name);
        }
    }

    pub fn with(mut self, agent: Arc<dyn SpecialistAgent>) -> Self {
        self.register(agent);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SpecialistAgent>> {
        self.agents.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Calls `lookup`, bounding the whole call (retries included) by `limit`.
pub(crate) async fn call_lookup(lookup: &dyn Lookup, place: &str, limit: Duration) -> Result<String> {
    let name = lookup.name();
    retry::with_timeout(limit, lookup.lookup(place), |ms| {
        SupervisorError::lookup(name, format!("timed out after {} ms", ms))
    })
    .await
}

pub(crate) fn apology(place: &str) -> String {
    format!(
        "Sorry, I could not get that information for {} right now. Please try again later.",
        place
    )
}

pub(crate) fn no_place_reply(query: &str) -> String {
    format!(
        "I could not find a city name in \"{}\". Please mention the city you are asking about.",
        query
    )
}
