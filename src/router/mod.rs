//! Supervisor routing
//!
//! A router looks at the run state and names the next specialist, or
//! FINISH. The router may write to the run state (model downgrade, last
//! error) so later cycles remember what happened.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::GraphConfig;
use crate::decision::Decider;
use crate::error::SupervisorError;
use crate::models::{GraphRunState, Route, FINISH};
use crate::retry;
use crate::Result;

pub mod fallback;

pub use fallback::FallbackRouter;

/// Trait for per-cycle routing strategies
#[async_trait]
pub trait Router: Send + Sync {
    fn name(&self) -> &str;

    async fn decide(&self, state: &mut GraphRunState) -> Result<Route>;
}

/// One decider call per cycle over `{FINISH, members...}`.
pub struct ReactiveRouter {
    decider: Arc<dyn Decider>,
    options: Vec<String>,
    finish_after_answer: bool,
    timeout: Duration,
}

impl ReactiveRouter {
    pub fn new(decider: Arc<dyn Decider>, members: Vec<String>) -> Self {
        let mut options = Vec::with_capacity(members.len() + 1);
        options.push(FINISH.to_string());
        options.extend(members);

        let defaults = GraphConfig::default();
        Self {
            decider,
            options,
            finish_after_answer: defaults.finish_after_answer,
            timeout: defaults.decision_timeout,
        }
    }

    pub fn with_config(mut self, config: &GraphConfig) -> Self {
        self.finish_after_answer = config.finish_after_answer;
        self.timeout = config.decision_timeout;
        self
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }
}

#[async_trait]
impl Router for ReactiveRouter {
    fn name(&self) -> &str {
        self.decider.name()
    }

    async fn decide(&self, state: &mut GraphRunState) -> Result<Route> {
        if self.finish_after_answer && state.conversation.specialist_answered_since_last_query() {
            debug!(session_id = %state.session_id, "Specialist already answered, finishing");
            return Ok(Route::Finish);
        }

        let decider = self.decider.name().to_string();
        let label = retry::with_timeout(
            self.timeout,
            self.decider.choose(&state.conversation, &self.options),
            |ms| SupervisorError::DecisionUnavailable(format!("{} timed out after {} ms", decider, ms)),
        )
        .await?;

        let route = Route::from_label(&label);
        info!(
            session_id = %state.session_id,
            decider = %decider,
            next = %route,
            "Routing decision"
        );
        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::ScriptedDecider;
    use crate::models::{Phase, Turn};

    fn members() -> Vec<String> {
        vec!["WeatherAgent".to_string(), "GeographyAgent".to_string()]
    }

    #[tokio::test]
    async fn test_offers_finish_and_members() {
        let router = ReactiveRouter::new(Arc::new(ScriptedDecider::new("stub")), members());
        assert_eq!(router.options(), &[FINISH, "WeatherAgent", "GeographyAgent"]);
    }

    #[tokio::test]
    async fn test_routes_to_chosen_specialist() {
        let decider = Arc::new(ScriptedDecider::new("stub").then_choose("WeatherAgent"));
        let router = ReactiveRouter::new(decider, members());
        let mut state = GraphRunState::new("s1", "weather in Paris", Phase::Routing);

        assert_eq!(
            router.decide(&mut state).await.unwrap(),
            Route::Agent("WeatherAgent".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_label_is_unavailable() {
        let decider = Arc::new(ScriptedDecider::new("stub").then_choose("PoetryAgent"));
        let router = ReactiveRouter::new(decider, members());
        let mut state = GraphRunState::new("s1", "write a poem", Phase::Routing);

        let err = router.decide(&mut state).await.unwrap_err();
        assert!(matches!(err, SupervisorError::DecisionUnavailable(_)));
    }

    #[tokio::test]
    async fn test_structural_finish_skips_decider() {
        let decider = Arc::new(ScriptedDecider::cycling("stub", &["WeatherAgent"]));
        let config = GraphConfig {
            finish_after_answer: true,
            ..GraphConfig::default()
        };
        let router = ReactiveRouter::new(decider.clone(), members()).with_config(&config);

        let mut state = GraphRunState::new("s1", "weather in Paris", Phase::Routing);
        assert_eq!(
            router.decide(&mut state).await.unwrap(),
            Route::Agent("WeatherAgent".to_string())
        );

        state.conversation.push(Turn::specialist("WeatherAgent", "Paris: 18°C"));
        assert_eq!(router.decide(&mut state).await.unwrap(), Route::Finish);
        assert_eq!(decider.choose_calls(), 1);
    }
}
