//! Offline keyword decider
//!
//! Scores each offered label against a static keyword list.
//! Used when no model API key is configured.

use async_trait::async_trait;

use crate::decision::Decider;
use crate::models::{ConversationState, PlannedStep, StepResult, FINISH};
use crate::Result;

/// Static keyword lists
const WEATHER_KEYWORDS: &[&str] = &[
    "weather", "temperature", "forecast", "rain", "sunny", "snow", "wind", "degrees", "cold",
    "hot", "climate",
];

const COORDINATE_KEYWORDS: &[&str] = &[
    "coordinates", "coords", "latitude", "longitude", "where", "located", "location",
];

const POPULATION_KEYWORDS: &[&str] = &[
    "population", "people", "inhabitants", "residents", "live", "populous",
];

const TRAFFIC_KEYWORDS: &[&str] = &["traffic", "jam", "congestion", "roads", "commute"];

fn keywords_for(label: &str) -> Vec<&'static str> {
    match label {
        "WeatherAgent" | "get_weather" => WEATHER_KEYWORDS.to_vec(),
        "get_coordinates" => COORDINATE_KEYWORDS.to_vec(),
        "get_population" => POPULATION_KEYWORDS.to_vec(),
        "get_traffic_info" => TRAFFIC_KEYWORDS.to_vec(),
        "GeographyAgent" => COORDINATE_KEYWORDS
            .iter()
            .chain(POPULATION_KEYWORDS)
            .chain(TRAFFIC_KEYWORDS)
            .copied()
            .collect(),
        _ => Vec::new(),
    }
}

fn score(text: &str, label: &str) -> usize {
    keywords_for(label)
        .iter()
        .filter(|kw| text.contains(**kw))
        .count()
}

/// Best-scoring option for `text`, if any keyword matches at all.
pub fn keyword_match(text: &str, options: &[String]) -> Option<String> {
    let lowered = text.to_lowercase();
    let mut best: Option<(&String, usize)> = None;

    for option in options {
        let s = score(&lowered, option);
        if s > 0 && best.map_or(true, |(_, b)| s > b) {
            best = Some((option, s));
        }
    }

    best.map(|(option, _)| option.clone())
}

/// Keyword heuristic decider
#[derive(Debug, Default)]
pub struct KeywordDecider;

#[async_trait]
impl Decider for KeywordDecider {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn choose(&self, history: &ConversationState, options: &[String]) -> Result<String> {
        let offers_finish = options.iter().any(|o| o == FINISH);

        if offers_finish && history.specialist_answered_since_last_query() {
            return Ok(FINISH.to_string());
        }

        let text = history
            .last_user_query()
            .map(|t| t.text.as_str())
            .unwrap_or_default();

        let candidates: Vec<String> = options
            .iter()
            .filter(|o| o.as_str() != FINISH)
            .cloned()
            .collect();

        Ok(keyword_match(text, &candidates)
            .or_else(|| candidates.first().cloned())
            .unwrap_or_else(|| FINISH.to_string()))
    }

    async fn plan_objective(&self, objective: &str, agents: &[String]) -> Result<Vec<PlannedStep>> {
        let lowered = objective.to_lowercase();

        let mut steps: Vec<PlannedStep> = agents
            .iter()
            .filter(|agent| score(&lowered, agent) > 0)
            .map(|agent| PlannedStep::new(agent.clone(), objective))
            .collect();

        if steps.is_empty() {
            if let Some(first) = agents.first() {
                steps.push(PlannedStep::new(first.clone(), objective));
            }
        }

        Ok(steps)
    }

    async fn synthesize(&self, objective: &str, steps: &[StepResult]) -> Result<String> {
        if steps.is_empty() {
            return Ok(format!("I could not gather anything for \"{}\".", objective));
        }

        let body = steps
            .iter()
            .map(|s| format!("- {}", s.result))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(format!("Here is what the team found for \"{}\":\n{}", objective, body))
    }
}
