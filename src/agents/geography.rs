//! Geography specialist
//!
//! Answers coordinates, population and traffic questions. Picks one lookup
//! per turn: keyword intent first, then the optional selector decider,
//! then population.
//!
//! With a `ConfidenceScorer` attached the turn text is a JSON
//! `ConfidenceEnvelope` instead of plain text, so the interrupt gate can
//! inspect it.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::agents::{
    apology, call_lookup, no_place_reply, ConfidenceScorer, SpecialistAgent, GEOGRAPHY_AGENT,
};
use crate::decision::{keyword_match, Decider};
use crate::error::SupervisorError;
use crate::lookup::{extract_place, LookupRegistry, GET_POPULATION};
use crate::models::{ConfidenceEnvelope, ConversationState, Turn};
use crate::retry;
use crate::Result;

const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_DECISION_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GeographyAgent {
    lookups: LookupRegistry,
    selector: Option<Arc<dyn Decider>>,
    scorer: Option<Arc<dyn ConfidenceScorer>>,
    lookup_timeout: Duration,
    decision_timeout: Duration,
}

impl GeographyAgent {
    pub fn new(lookups: LookupRegistry) -> Self {
        Self {
            lookups,
            selector: None,
            scorer: None,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            decision_timeout: DEFAULT_DECISION_TIMEOUT,
        }
    }

    /// Decider consulted when no keyword names a lookup.
    pub fn with_selector(mut self, selector: Arc<dyn Decider>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Turns on confidence envelopes.
    pub fn with_confidence(mut self, scorer: Arc<dyn ConfidenceScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_timeouts(mut self, lookup: Duration, decision: Duration) -> Self {
        self.lookup_timeout = lookup;
        self.decision_timeout = decision;
        self
    }

    fn default_lookup(&self, names: &[String]) -> Option<String> {
        names
            .iter()
            .find(|n| n.as_str() == GET_POPULATION)
            .or_else(|| names.first())
            .cloned()
    }

    async fn select_lookup(&self, state: &ConversationState, query: &str) -> Option<String> {
        let names = self.lookups.names();

        if let Some(name) = keyword_match(query, &names) {
            debug!(agent = GEOGRAPHY_AGENT, lookup = %name, "Lookup selected by keyword");
            return Some(name);
        }

        if let Some(selector) = &self.selector {
            let chosen = retry::with_timeout(
                self.decision_timeout,
                selector.choose(state, &names),
                |ms| SupervisorError::DecisionUnavailable(format!("lookup selection timed out after {} ms", ms)),
            )
            .await;

            match chosen {
                Ok(name) => {
                    debug!(agent = GEOGRAPHY_AGENT, lookup = %name, selector = selector.name(), "Lookup selected by decider");
                    return Some(name);
                }
                Err(e) => {
                    warn!(agent = GEOGRAPHY_AGENT, error = %e, "Lookup selection failed, using default");
                }
            }
        }

        self.default_lookup(&names)
    }
}

#[async_trait]
impl SpecialistAgent for GeographyAgent {
    fn name(&self) -> &str {
        GEOGRAPHY_AGENT
    }

    fn checks_confidence(&self) -> bool {
        self.scorer.is_some()
    }

    async fn respond(&self, state: &ConversationState) -> Result<Turn> {
        let query = state
            .last_user_query()
            .map(|t| t.text.clone())
            .unwrap_or_default();

        let Some(place) = extract_place(&query) else {
            return Ok(Turn::specialist(GEOGRAPHY_AGENT, no_place_reply(&query)));
        };

        let lookup = self
            .select_lookup(state, &query)
            .await
            .and_then(|name| self.lookups.get(&name));

        let Some(lookup) = lookup else {
            warn!(agent = GEOGRAPHY_AGENT, "No lookups registered");
            return Ok(Turn::specialist(GEOGRAPHY_AGENT, apology(&place)));
        };

        let content = match call_lookup(lookup.as_ref(), &place, self.lookup_timeout).await {
            Ok(text) => text,
            Err(e) => {
                warn!(agent = GEOGRAPHY_AGENT, lookup = lookup.name(), %place, error = %e, "Geography lookup failed");
                return Ok(Turn::specialist(GEOGRAPHY_AGENT, apology(&place)));
            }
        };

        match &self.scorer {
            Some(scorer) => {
                let confidence = scorer.score(lookup.name(), &content);
                info!(
                    agent = GEOGRAPHY_AGENT,
                    lookup = lookup.name(),
                    confidence,
                    "Answer scored"
                );
                let envelope = ConfidenceEnvelope::new(lookup.name(), content, confidence);
                Ok(Turn::specialist(GEOGRAPHY_AGENT, envelope.to_json()?))
            }
            None => Ok(Turn::specialist(GEOGRAPHY_AGENT, content)),
        }
    }
}
