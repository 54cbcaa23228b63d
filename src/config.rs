//! Runtime configuration
//!
//! Values come from the process environment (optionally seeded from `.env`).
//! Every knob has a default so the sandbox runs with no configuration at all.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::SupervisorError;
use crate::Result;

pub const DEFAULT_RECURSION_LIMIT: u32 = 100;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Retry budget for unstable lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts < 1 {
            return Err(SupervisorError::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !(self.backoff_multiplier > 1.0) {
            return Err(SupervisorError::Configuration(
                "backoff_multiplier must be greater than 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Knobs for one execution graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    pub recursion_limit: u32,
    pub confidence_threshold: f64,
    /// Route to FINISH without asking once a specialist has answered.
    pub finish_after_answer: bool,
    pub decision_timeout: Duration,
    pub lookup_timeout: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            finish_after_answer: false,
            decision_timeout: Duration::from_secs(30),
            lookup_timeout: Duration::from_secs(10),
        }
    }
}

/// Process-level settings read by the binaries.
#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub primary_model: String,
    pub fallback_model: String,
    pub weather_api_key: Option<String>,
    pub graph: GraphConfig,
    pub retry: RetryConfig,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let defaults = GraphConfig::default();

        let graph = GraphConfig {
            recursion_limit: parse_var("RECURSION_LIMIT", defaults.recursion_limit)?,
            confidence_threshold: parse_var("CONFIDENCE_THRESHOLD", defaults.confidence_threshold)?,
            finish_after_answer: parse_var("FINISH_AFTER_ANSWER", defaults.finish_after_answer)?,
            decision_timeout: Duration::from_secs(parse_var(
                "DECISION_TIMEOUT_SECS",
                defaults.decision_timeout.as_secs(),
            )?),
            lookup_timeout: Duration::from_secs(parse_var(
                "LOOKUP_TIMEOUT_SECS",
                defaults.lookup_timeout.as_secs(),
            )?),
        };

        if !(0.0..=1.0).contains(&graph.confidence_threshold) {
            return Err(SupervisorError::Configuration(format!(
                "CONFIDENCE_THRESHOLD must be within [0, 1], got {}",
                graph.confidence_threshold
            )));
        }

        let port = match env::var("PORT").or_else(|_| env::var("API_PORT")) {
            Ok(raw) => raw.parse().map_err(|_| {
                SupervisorError::Configuration(format!("invalid port '{}'", raw))
            })?,
            Err(_) => 8080,
        };

        Ok(Self {
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            primary_model: non_empty_var("GEMINI_PRIMARY_MODEL")
                .unwrap_or_else(|| "gemini-2.0-flash-lite".to_string()),
            fallback_model: non_empty_var("GEMINI_FALLBACK_MODEL")
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            weather_api_key: non_empty_var("WEATHERAPI_COM_KEY")
                .filter(|k| k != "YOUR_API_KEY_HERE"),
            graph,
            retry: RetryConfig::default(),
            port,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match non_empty_var(name) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            SupervisorError::Configuration(format!("invalid value for {}: '{}'", name, raw))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_validation() {
        assert!(RetryConfig::default().validate().is_ok());

        let zero = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };
        assert!(zero.validate().is_err());

        let flat = RetryConfig {
            backoff_multiplier: 1.0,
            ..RetryConfig::default()
        };
        assert!(flat.validate().is_err());
    }

    #[test]
    fn test_graph_defaults() {
        let config = GraphConfig::default();
        assert_eq!(config.recursion_limit, 100);
        assert!((config.confidence_threshold - 0.7).abs() < f64::EPSILON);
        assert!(!config.finish_after_answer);
    }

    #[test]
    fn test_parse_var_falls_back_to_default() {
        let value: u32 = parse_var("AGENT_SUPERVISOR_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
