//! Weather lookup
//!
//! Uses WeatherAPI.com when a key is configured, otherwise mock data.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::SupervisorError;
use crate::lookup::{Lookup, GET_WEATHER};
use crate::Result;

#[derive(Clone)]
pub struct WeatherApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl WeatherApiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: "https://api.weatherapi.com/v1".to_string(),
        })
    }

    /// Current conditions. An API-level error is reported as text, a
    /// transport failure as `LookupFailed`.
    async fn current(&self, place: &str) -> Result<String> {
        let url = format!("{}/current.json", self.base_url);

        let response = self
            .client
            .get(url)
            .query(&[("key", self.api_key.as_str()), ("q", place), ("aqi", "no")])
            .send()
            .await
            .map_err(|e| SupervisorError::lookup(GET_WEATHER, e.to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SupervisorError::lookup(GET_WEATHER, format!("invalid JSON response: {}", e)))?;

        if !status.is_success() {
            let reason = body
                .pointer("/error/message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown API error");
            warn!(lookup = GET_WEATHER, %status, reason, "WeatherAPI.com returned an error");
            return Ok(format!(
                "Could not get weather data for {}. Reason: {}.",
                place, reason
            ));
        }

        let current: CurrentResponse = serde_json::from_value(body)?;
        Ok(format!(
            "Weather in {}: {}°C, {}.",
            current.location.name, current.current.temp_c, current.current.condition.text
        ))
    }
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    location: Location,
    current: Current,
}

#[derive(Debug, Deserialize)]
struct Location {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Current {
    temp_c: f64,
    condition: Condition,
}

#[derive(Debug, Deserialize)]
struct Condition {
    text: String,
}

pub struct WeatherLookup {
    api: Option<WeatherApiClient>,
}

impl WeatherLookup {
    pub fn new(api: Option<WeatherApiClient>) -> Self {
        Self { api }
    }

    pub fn mock() -> Self {
        Self { api: None }
    }
}

#[async_trait]
impl Lookup for WeatherLookup {
    fn name(&self) -> &'static str {
        GET_WEATHER
    }

    async fn lookup(&self, place: &str) -> Result<String> {
        match &self.api {
            Some(api) => api.current(place).await,
            None => {
                debug!(lookup = GET_WEATHER, "No WeatherAPI.com key, returning mock data");
                Ok(format!(
                    "Mock data: it is 22°C in {} right now, partly cloudy.",
                    place
                ))
            }
        }
    }
}
