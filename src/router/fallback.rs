//! Primary/secondary router with a one-way downgrade
//!
//! The first decision failure flips `current_model` to secondary for the
//! rest of the run and retries the same decision once. A secondary failure
//! forces FINISH and records the error.

use async_trait::async_trait;
use tracing::{error, warn};

use crate::models::{GraphRunState, ModelTier, Route};
use crate::router::{ReactiveRouter, Router};
use crate::Result;

pub struct FallbackRouter {
    primary: ReactiveRouter,
    secondary: ReactiveRouter,
}

impl FallbackRouter {
    pub fn new(primary: ReactiveRouter, secondary: ReactiveRouter) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl Router for FallbackRouter {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn decide(&self, state: &mut GraphRunState) -> Result<Route> {
        if state.current_model == ModelTier::Primary {
            match self.primary.decide(state).await {
                Ok(route) => return Ok(route),
                Err(e) => {
                    warn!(
                        session_id = %state.session_id,
                        primary = self.primary.name(),
                        secondary = self.secondary.name(),
                        error = %e,
                        "Primary decider failed, switching to secondary"
                    );
                    state.current_model = ModelTier::Secondary;
                    state.last_error = Some(e.to_string());
                }
            }
        }

        match self.secondary.decide(state).await {
            Ok(route) => Ok(route),
            Err(e) => {
                error!(
                    session_id = %state.session_id,
                    secondary = self.secondary.name(),
                    error = %e,
                    "Secondary decider failed, forcing FINISH"
                );
                state.last_error = Some(e.to_string());
                Ok(Route::Finish)
            }
        }
    }
}
