//! Mocked geography lookups backed by static tables

use async_trait::async_trait;
use tracing::debug;

use crate::lookup::{Lookup, GET_COORDINATES, GET_POPULATION, GET_TRAFFIC_INFO};
use crate::Result;

const NOT_FOUND: &str = "not found";
const UNKNOWN: &str = "unknown";
const NO_DATA: &str = "no data";

const COORDINATES: &[(&str, &str)] = &[
    ("moscow", "55.7558° N, 37.6173° E"),
    ("paris", "48.8566° N, 2.3522° E"),
    ("london", "51.5074° N, 0.1278° W"),
    ("tokyo", "35.6895° N, 139.6917° E"),
];

const POPULATION: &[(&str, &str)] = &[
    ("moscow", "12.6 million"),
    ("paris", "2.1 million"),
    ("london", "8.9 million"),
    ("tokyo", "14.0 million"),
];

const TRAFFIC: &[(&str, &str)] = &[
    ("moscow", "8 points, congestion in the centre"),
    ("paris", "6 points, slow traffic on the ring road"),
    ("london", "7 points, heavy traffic in the City"),
    ("tokyo", "5 points, traffic is normal"),
];

fn table_lookup(table: &[(&str, &'static str)], place: &str) -> Option<&'static str> {
    let key = place.trim().to_lowercase();
    table.iter().find(|(city, _)| *city == key).map(|(_, v)| *v)
}

/// True when a mock lookup answered without data for the place.
pub fn reports_missing_data(text: &str) -> bool {
    let lowered = text.to_lowercase();
    [NOT_FOUND, UNKNOWN, NO_DATA]
        .iter()
        .any(|marker| lowered.ends_with(marker))
}

pub struct CoordinatesLookup;

#[async_trait]
impl Lookup for CoordinatesLookup {
    fn name(&self) -> &'static str {
        GET_COORDINATES
    }

    async fn lookup(&self, place: &str) -> Result<String> {
        let result = format!(
            "Coordinates of {}: {}",
            place,
            table_lookup(COORDINATES, place).unwrap_or(NOT_FOUND)
        );
        debug!(lookup = GET_COORDINATES, %result, "Lookup answered");
        Ok(result)
    }
}

pub struct PopulationLookup;

#[async_trait]
impl Lookup for PopulationLookup {
    fn name(&self) -> &'static str {
        GET_POPULATION
    }

    async fn lookup(&self, place: &str) -> Result<String> {
        let result = match table_lookup(POPULATION, place) {
            Some(count) => format!("Population of {}: ~{}", place, count),
            None => format!("Population of {}: {}", place, UNKNOWN),
        };
        debug!(lookup = GET_POPULATION, %result, "Lookup answered");
        Ok(result)
    }
}

pub struct TrafficLookup;

#[async_trait]
impl Lookup for TrafficLookup {
    fn name(&self) -> &'static str {
        GET_TRAFFIC_INFO
    }

    async fn lookup(&self, place: &str) -> Result<String> {
        let result = format!(
            "Traffic in {}: {}",
            place,
            table_lookup(TRAFFIC, place).unwrap_or(NO_DATA)
        );
        debug!(lookup = GET_TRAFFIC_INFO, %result, "Lookup answered");
        Ok(result)
    }
}
