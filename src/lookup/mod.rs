//! Lookup trait and registry
//!
//! Lookups are the data sources behind specialists: given a place name they
//! return a descriptive string or fail with `LookupFailed`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RetryConfig;
use crate::retry;
use crate::Result;

pub mod flaky;
pub mod mock;
pub mod place;
pub mod weather;

pub use flaky::{FailAlways, FailEveryOther, FailFirst, FailureInjector, FlakyLookup};
pub use mock::{reports_missing_data, CoordinatesLookup, PopulationLookup, TrafficLookup};
pub use place::extract_place;
pub use weather::{WeatherApiClient, WeatherLookup};

pub const GET_WEATHER: &str = "get_weather";
pub const GET_COORDINATES: &str = "get_coordinates";
pub const GET_POPULATION: &str = "get_population";
pub const GET_TRAFFIC_INFO: &str = "get_traffic_info";

/// Trait for a single data lookup
#[async_trait]
pub trait Lookup: Send + Sync {
    fn name(&self) -> &'static str;
    async fn lookup(&self, place: &str) -> Result<String>;
}

/// Ordered registry of lookups available to one specialist
#[derive(Clone, Default)]
pub struct LookupRegistry {
    lookups: HashMap<String, Arc<dyn Lookup>>,
    order: Vec<String>,
}

impl LookupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, lookup: Arc<dyn Lookup>) {
        let name = lookup.name().to_string();
        if self.lookups.insert(name.clone(), lookup).is_none() {
            self.order.push(name);
        }
    }

    pub fn with(mut self, lookup: Arc<dyn Lookup>) -> Self {
        self.register(lookup);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Lookup>> {
        self.lookups.get(name).cloned()
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Retries the wrapped lookup with exponential backoff
pub struct RetryingLookup {
    inner: Arc<dyn Lookup>,
    config: RetryConfig,
}

impl RetryingLookup {
    pub fn new(inner: Arc<dyn Lookup>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl Lookup for RetryingLookup {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn lookup(&self, place: &str) -> Result<String> {
        retry::execute(self.inner.name(), &self.config, || self.inner.lookup(place)).await
    }
}

/// Geography lookups, each wrapped for retry.
pub fn create_geography_registry(retry: &RetryConfig, population: Arc<dyn Lookup>) -> LookupRegistry {
    LookupRegistry::new()
        .with(Arc::new(RetryingLookup::new(
            Arc::new(CoordinatesLookup),
            retry.clone(),
        )))
        .with(Arc::new(RetryingLookup::new(population, retry.clone())))
        .with(Arc::new(RetryingLookup::new(
            Arc::new(TrafficLookup),
            retry.clone(),
        )))
}
