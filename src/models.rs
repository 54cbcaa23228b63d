//! Core data models for the supervisor graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

use crate::error::SupervisorError;
use crate::Result;

/// Label the decision capability returns to end a run.
pub const FINISH: &str = "FINISH";

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Specialist,
    Supervisor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    fn build(speaker: Speaker, text: String, source_agent: Option<String>) -> Self {
        Self {
            speaker,
            text,
            source_agent,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::build(Speaker::User, text.into(), None)
    }

    pub fn specialist(agent: impl Into<String>, text: impl Into<String>) -> Self {
        Self::build(Speaker::Specialist, text.into(), Some(agent.into()))
    }

    pub fn supervisor(text: impl Into<String>) -> Self {
        Self::build(Speaker::Supervisor, text.into(), None)
    }

    /// A reviewer's replacement for a specialist answer.
    pub fn reviewer_edit(agent: impl Into<String>, text: impl Into<String>) -> Self {
        Self::build(Speaker::User, text.into(), Some(agent.into()))
    }

    pub fn reviewer_rejection(agent: impl Into<String>, text: impl Into<String>) -> Self {
        Self::build(Speaker::Supervisor, text.into(), Some(agent.into()))
    }

    /// A fresh question from the user (not a reviewer edit).
    pub fn is_user_query(&self) -> bool {
        self.speaker == Speaker::User && self.source_agent.is_none()
    }
}

/// Append-only, ordered conversation history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationState {
    turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_query(query: impl Into<String>) -> Self {
        let mut state = Self::new();
        state.push(Turn::user(query));
        state
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last_user_query(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.is_user_query())
    }

    /// True when any turn attributed to a specialist follows the latest user query.
    pub fn specialist_answered_since_last_query(&self) -> bool {
        self.turns
            .iter()
            .rev()
            .take_while(|t| !t.is_user_query())
            .any(|t| t.source_agent.is_some())
    }

    /// Plain-text transcript, one `speaker(agent): text` line per turn.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| match &t.source_agent {
                Some(agent) => format!("{:?}({}): {}", t.speaker, agent, t.text),
                None => format!("{:?}: {}", t.speaker, t.text),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

//
// ================= Routing =================
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Agent(String),
    Finish,
}

impl Route {
    pub fn from_label(label: &str) -> Self {
        if label == FINISH {
            Route::Finish
        } else {
            Route::Agent(label.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Route::Agent(name) => name,
            Route::Finish => FINISH,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Which decision-capability strength the router is currently using.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    #[default]
    Primary,
    Secondary,
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelTier::Primary => "primary",
            ModelTier::Secondary => "secondary",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Plan =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedStep {
    pub agent: String,
    pub query: String,
}

impl PlannedStep {
    pub fn new(agent: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            query: query.into(),
        }
    }
}

/// Ordered queue of steps, consumed from the front.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionPlan {
    steps: VecDeque<PlannedStep>,
}

impl ExecutionPlan {
    pub fn new(steps: Vec<PlannedStep>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    pub fn pop_front(&mut self) -> Option<PlannedStep> {
        self.steps.pop_front()
    }

    pub fn front(&self) -> Option<&PlannedStep> {
        self.steps.front()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlannedStep> {
        self.steps.iter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub agent: String,
    pub query: String,
    pub result: String,
}

//
// ================= Confidence =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceEnvelope {
    pub tool: String,
    pub content: String,
    pub confidence: f64,
}

impl ConfidenceEnvelope {
    pub fn new(tool: impl Into<String>, content: impl Into<String>, confidence: f64) -> Self {
        Self {
            tool: tool.into(),
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Interpret turn text as an envelope. Anything else is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let envelope: ConfidenceEnvelope = serde_json::from_str(text.trim()).ok()?;
        if !envelope.confidence.is_finite() || !(0.0..=1.0).contains(&envelope.confidence) {
            return None;
        }
        Some(envelope)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

//
// ================= Run State =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Routing,
    RunningSpecialist { target: String },
    Checking { agent: String },
    Suspended { agent: String },
    Planning,
    ExecutingStep,
    Responding,
    Done,
}

/// Reviewer decision for a suspended run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum ResumeDecision {
    Approve,
    Edit { payload: String },
    Reject {
        #[serde(default)]
        payload: Option<String>,
    },
}

impl ResumeDecision {
    pub fn parse(decision: &str, payload: Option<String>) -> Result<Self> {
        let payload = payload.filter(|p| !p.trim().is_empty());
        match decision.trim().to_lowercase().as_str() {
            "approve" | "a" => Ok(ResumeDecision::Approve),
            "edit" | "e" => payload
                .map(|payload| ResumeDecision::Edit { payload })
                .ok_or_else(|| {
                    SupervisorError::InvalidInput("edit requires a replacement text".to_string())
                }),
            "reject" | "r" => Ok(ResumeDecision::Reject { payload }),
            other => Err(SupervisorError::InvalidInput(format!(
                "unknown resume decision '{}'",
                other
            ))),
        }
    }
}

/// Everything one in-flight run owns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphRunState {
    pub run_id: Uuid,
    pub session_id: String,
    pub conversation: ConversationState,
    pub next: Option<Route>,
    #[serde(default)]
    pub current_model: ModelTier,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub plan: ExecutionPlan,
    #[serde(default)]
    pub past_steps: Vec<StepResult>,
    #[serde(default)]
    pub response: Option<String>,
    pub phase: Phase,
    pub cycles: u32,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub pending: Option<ConfidenceEnvelope>,
    #[serde(default)]
    pub resume: Option<ResumeDecision>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GraphRunState {
    pub fn new(session_id: impl Into<String>, query: impl Into<String>, phase: Phase) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            session_id: session_id.into(),
            conversation: ConversationState::from_query(query),
            next: None,
            current_model: ModelTier::Primary,
            last_error: None,
            plan: ExecutionPlan::default(),
            past_steps: Vec::new(),
            response: None,
            phase,
            cycles: 0,
            interrupted: false,
            pending: None,
            resume: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// The first user query of the run.
    pub fn objective(&self) -> &str {
        self.conversation
            .turns()
            .iter()
            .find(|t| t.is_user_query())
            .map(|t| t.text.as_str())
            .unwrap_or_default()
    }

    pub fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.updated_at = Utc::now();
    }
}

//
// ================= Outcome =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunOutcome {
    Completed {
        answer: String,
        state: GraphRunState,
    },
    Suspended {
        session_id: String,
        envelope: ConfidenceEnvelope,
        state: GraphRunState,
    },
}

impl RunOutcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            RunOutcome::Completed { answer, .. } => Some(answer),
            RunOutcome::Suspended { .. } => None,
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, RunOutcome::Suspended { .. })
    }

    pub fn state(&self) -> &GraphRunState {
        match self {
            RunOutcome::Completed { state, .. } | RunOutcome::Suspended { state, .. } => state,
        }
    }
}
