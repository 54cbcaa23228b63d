//! Weather specialist

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::agents::{apology, call_lookup, no_place_reply, SpecialistAgent, WEATHER_AGENT};
use crate::lookup::{extract_place, Lookup, WeatherLookup};
use crate::models::{ConversationState, Turn};
use crate::Result;

const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WeatherAgent {
    lookup: Arc<dyn Lookup>,
    lookup_timeout: Duration,
}

impl WeatherAgent {
    pub fn new(lookup: Arc<dyn Lookup>) -> Self {
        Self {
            lookup,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Weather agent over mock data
    pub fn mock() -> Self {
        Self::new(Arc::new(WeatherLookup::mock()))
    }

    pub fn with_lookup_timeout(mut self, limit: Duration) -> Self {
        self.lookup_timeout = limit;
        self
    }
}

#[async_trait]
impl SpecialistAgent for WeatherAgent {
    fn name(&self) -> &str {
        WEATHER_AGENT
    }

    async fn respond(&self, state: &ConversationState) -> Result<Turn> {
        let query = state
            .last_user_query()
            .map(|t| t.text.clone())
            .unwrap_or_default();

        let Some(place) = extract_place(&query) else {
            debug!(agent = WEATHER_AGENT, %query, "No place in query");
            return Ok(Turn::specialist(WEATHER_AGENT, no_place_reply(&query)));
        };

        let text = match call_lookup(self.lookup.as_ref(), &place, self.lookup_timeout).await {
            Ok(text) => text,
            Err(e) => {
                warn!(agent = WEATHER_AGENT, %place, error = %e, "Weather lookup failed");
                apology(&place)
            }
        };

        Ok(Turn::specialist(WEATHER_AGENT, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{FailAlways, FlakyLookup};
    use crate::models::Speaker;

    #[tokio::test]
    async fn test_answers_with_lookup_text() {
        let turn = WeatherAgent::mock()
            .respond(&ConversationState::from_query("weather in Paris"))
            .await
            .unwrap();

        assert_eq!(turn.speaker, Speaker::Specialist);
        assert_eq!(turn.source_agent.as_deref(), Some(WEATHER_AGENT));
        assert!(turn.text.contains("Paris"));
    }

    #[tokio::test]
    async fn test_lookup_failure_becomes_apology() {
        let broken = FlakyLookup::new(Arc::new(WeatherLookup::mock()), Arc::new(FailAlways));
        let agent = WeatherAgent::new(Arc::new(broken));

        let turn = agent
            .respond(&ConversationState::from_query("weather in Tokyo"))
            .await
            .unwrap();
        assert!(turn.text.starts_with("Sorry"));
        assert!(turn.text.contains("Tokyo"));
    }

    #[tokio::test]
    async fn test_missing_place() {
        let turn = WeatherAgent::mock()
            .respond(&ConversationState::from_query("what is the weather"))
            .await
            .unwrap();
        assert!(turn.text.contains("could not find a city"));
    }
}
