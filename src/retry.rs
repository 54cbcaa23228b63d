//! Bounded retries with deterministic exponential backoff
//!
//! Delay before attempt k (k >= 2) is `initial_delay * multiplier^(k-2)`.
//! No jitter.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::RetryConfig;
use crate::error::SupervisorError;
use crate::Result;

/// Per-call bookkeeping. Lives only for one `execute` invocation.
#[derive(Debug)]
pub struct RetryState {
    pub attempt: u32,
    pub last_error: Option<SupervisorError>,
}

impl RetryState {
    fn new() -> Self {
        Self {
            attempt: 0,
            last_error: None,
        }
    }
}

/// Delay slept before `attempt` (1-based). Attempt 1 never waits.
pub fn delay_before(attempt: u32, config: &RetryConfig) -> Duration {
    if attempt < 2 {
        return Duration::ZERO;
    }
    config
        .initial_delay
        .mul_f64(config.backoff_multiplier.powi(attempt as i32 - 2))
}

/// Run `operation` until it succeeds or `max_attempts` calls have failed.
pub async fn execute<T, F, Fut>(label: &str, config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    config.validate()?;
    let mut state = RetryState::new();

    loop {
        state.attempt += 1;

        match operation().await {
            Ok(value) => {
                info!(operation = %label, attempt = state.attempt, "Attempt succeeded");
                return Ok(value);
            }
            Err(e) => {
                if state.attempt >= config.max_attempts {
                    warn!(
                        operation = %label,
                        attempt = state.attempt,
                        error = %e,
                        "Attempt failed, retries exhausted"
                    );
                    return Err(SupervisorError::ExhaustedRetries {
                        attempts: state.attempt,
                        last_error: Box::new(e),
                    });
                }

                let wait = delay_before(state.attempt + 1, config);
                warn!(
                    operation = %label,
                    attempt = state.attempt,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "Attempt failed, backing off"
                );
                state.last_error = Some(e);

                tokio::time::sleep(wait).await;
            }
        }
    }
}

/// Bound an opaque call. Elapsed deadline becomes `on_timeout(ms)`.
pub async fn with_timeout<T, Fut>(
    limit: Duration,
    future: Fut,
    on_timeout: impl FnOnce(u64) -> SupervisorError,
) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(limit.as_millis() as u64)),
    }
}
