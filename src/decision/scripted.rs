//! Deterministic decision stub
//!
//! Keeps routing sequences reproducible without any model behind them.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::decision::{match_option, Decider};
use crate::error::SupervisorError;
use crate::models::{ConversationState, PlannedStep, StepResult, FINISH};
use crate::Result;

#[derive(Debug, Clone)]
enum Reply {
    Label(String),
    Fail,
}

#[derive(Debug)]
enum Script {
    /// Replies in order, then `fallback` forever.
    Queue {
        replies: VecDeque<Reply>,
        fallback: Reply,
    },
    /// Replies repeat from the start.
    Cycle { replies: Vec<Reply>, next: usize },
}

pub struct ScriptedDecider {
    name: String,
    script: Mutex<Script>,
    plan: Result<Vec<PlannedStep>>,
    fail_synthesis: bool,
    choose_calls: AtomicUsize,
    plan_calls: AtomicUsize,
    synthesize_calls: AtomicUsize,
}

impl ScriptedDecider {
    /// Answers FINISH to every `choose` until told otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(Script::Queue {
                replies: VecDeque::new(),
                fallback: Reply::Label(FINISH.to_string()),
            }),
            plan: Ok(Vec::new()),
            fail_synthesis: false,
            choose_calls: AtomicUsize::new(0),
            plan_calls: AtomicUsize::new(0),
            synthesize_calls: AtomicUsize::new(0),
        }
    }

    /// Fails every call with `DecisionUnavailable`.
    pub fn unavailable(name: impl Into<String>) -> Self {
        let mut decider = Self::new(name);
        decider.script = Mutex::new(Script::Queue {
            replies: VecDeque::new(),
            fallback: Reply::Fail,
        });
        decider.plan = Err(SupervisorError::DecisionUnavailable(
            "scripted outage".to_string(),
        ));
        decider.fail_synthesis = true;
        decider
    }

    /// Answers the given labels round-robin forever.
    pub fn cycling(name: impl Into<String>, labels: &[&str]) -> Self {
        let mut decider = Self::new(name);
        decider.script = Mutex::new(Script::Cycle {
            replies: labels.iter().map(|l| Reply::Label(l.to_string())).collect(),
            next: 0,
        });
        decider
    }

    pub fn then_choose(self, label: impl Into<String>) -> Self {
        self.push(Reply::Label(label.into()));
        self
    }

    pub fn then_fail(self) -> Self {
        self.push(Reply::Fail);
        self
    }

    /// Reply used once the queued replies run out. Queued scripts only: a
    /// cycling script never runs out, so it is left unchanged.
    pub fn otherwise(self, label: impl Into<String>) -> Self {
        let label = label.into();
        match &mut *self.lock() {
            Script::Queue { fallback, .. } => *fallback = Reply::Label(label),
            Script::Cycle { .. } => {
                warn!(decider = %self.name, %label, "otherwise() has no effect on a cycling script");
            }
        }
        self
    }

    pub fn with_plan(mut self, steps: Vec<PlannedStep>) -> Self {
        self.plan = Ok(steps);
        self
    }

    pub fn choose_calls(&self) -> usize {
        self.choose_calls.load(Ordering::SeqCst)
    }

    pub fn plan_calls(&self) -> usize {
        self.plan_calls.load(Ordering::SeqCst)
    }

    pub fn synthesize_calls(&self) -> usize {
        self.synthesize_calls.load(Ordering::SeqCst)
    }

    fn push(&self, reply: Reply) {
        match &mut *self.lock() {
            Script::Queue { replies, .. } => replies.push_back(reply),
            Script::Cycle { replies, .. } => replies.push(reply),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_reply(&self) -> Reply {
        match &mut *self.lock() {
            Script::Queue { replies, fallback } => {
                replies.pop_front().unwrap_or_else(|| fallback.clone())
            }
            Script::Cycle { replies, next } => {
                if replies.is_empty() {
                    return Reply::Fail;
                }
                let reply = replies[*next % replies.len()].clone();
                *next += 1;
                reply
            }
        }
    }
}

#[async_trait]
impl Decider for ScriptedDecider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn choose(&self, _history: &ConversationState, options: &[String]) -> Result<String> {
        self.choose_calls.fetch_add(1, Ordering::SeqCst);
        match self.next_reply() {
            Reply::Label(label) => match_option(&label, options),
            Reply::Fail => Err(SupervisorError::DecisionUnavailable(format!(
                "{} is unavailable",
                self.name
            ))),
        }
    }

    async fn plan_objective(&self, _objective: &str, _agents: &[String]) -> Result<Vec<PlannedStep>> {
        self.plan_calls.fetch_add(1, Ordering::SeqCst);
        match &self.plan {
            Ok(steps) => Ok(steps.clone()),
            Err(e) => Err(SupervisorError::DecisionUnavailable(e.to_string())),
        }
    }

    async fn synthesize(&self, objective: &str, steps: &[StepResult]) -> Result<String> {
        self.synthesize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_synthesis {
            return Err(SupervisorError::DecisionUnavailable(format!(
                "{} is unavailable",
                self.name
            )));
        }
        if steps.is_empty() {
            return Ok(format!("No specialist results were gathered for: {}", objective));
        }
        Ok(steps
            .iter()
            .map(|s| s.result.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<String> {
        vec![FINISH.to_string(), "WeatherAgent".to_string(), "GeographyAgent".to_string()]
    }

    #[tokio::test]
    async fn test_queue_then_fallback() {
        let decider = ScriptedDecider::new("stub")
            .then_choose("WeatherAgent")
            .then_fail();
        let history = ConversationState::from_query("test");

        assert_eq!(decider.choose(&history, &options()).await.unwrap(), "WeatherAgent");
        assert!(decider.choose(&history, &options()).await.is_err());
        assert_eq!(decider.choose(&history, &options()).await.unwrap(), FINISH);
        assert_eq!(decider.choose_calls(), 3);
    }

    #[tokio::test]
    async fn test_cycling() {
        let decider = ScriptedDecider::cycling("stub", &["WeatherAgent", "GeographyAgent"]);
        let history = ConversationState::from_query("test");
        let picks = [
            decider.choose(&history, &options()).await.unwrap(),
            decider.choose(&history, &options()).await.unwrap(),
            decider.choose(&history, &options()).await.unwrap(),
        ];
        assert_eq!(picks, ["WeatherAgent", "GeographyAgent", "WeatherAgent"]);
    }

    #[tokio::test]
    async fn test_otherwise_leaves_cycle_untouched() {
        let decider = ScriptedDecider::cycling("stub", &["WeatherAgent"]).otherwise(FINISH);
        let history = ConversationState::from_query("test");
        for _ in 0..3 {
            assert_eq!(decider.choose(&history, &options()).await.unwrap(), "WeatherAgent");
        }

        let queued = ScriptedDecider::new("stub").then_choose("WeatherAgent").otherwise("GeographyAgent");
        assert_eq!(queued.choose(&history, &options()).await.unwrap(), "WeatherAgent");
        assert_eq!(queued.choose(&history, &options()).await.unwrap(), "GeographyAgent");
        assert_eq!(queued.choose(&history, &options()).await.unwrap(), "GeographyAgent");
    }

    #[tokio::test]
    async fn test_unavailable_fails_everything() {
        let decider = ScriptedDecider::unavailable("down");
        let history = ConversationState::from_query("test");
        assert!(decider.choose(&history, &options()).await.is_err());
        assert!(decider.plan_objective("x", &[]).await.is_err());
        assert!(decider.synthesize("x", &[]).await.is_err());
    }
}
