//! Error types for the agent supervisor

use thiserror::Error;

/// Result type alias for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;

#[derive(Error, Debug)]
pub enum SupervisorError {

    // =============================
    // Collaborator Failures
    // =============================

    #[error("Lookup failed ({lookup}): {reason}")]
    LookupFailed { lookup: String, reason: String },

    #[error("Decision capability unavailable: {0}")]
    DecisionUnavailable(String),

    #[error("Exhausted {attempts} retries: {last_error}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last_error: Box<SupervisorError>,
    },

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    // =============================
    // Run Failures
    // =============================

    #[error("Graph recursion limit of {limit} exceeded")]
    GraphRecursionExceeded { limit: u32 },

    #[error("Plan step names unknown agent: {0}")]
    PlanStepAgentNotFound(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    // =============================
    // Session / Checkpoint Errors
    // =============================

    #[error("No checkpoint for session: {0}")]
    SessionNotFound(String),

    #[error("Session is not suspended: {0}")]
    NotSuspended(String),

    #[error("Checkpoint corrupted for session: {0}")]
    CheckpointCorrupted(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SupervisorError {
    pub fn lookup(lookup: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LookupFailed {
            lookup: lookup.into(),
            reason: reason.into(),
        }
    }

    /// Failures that end a run without an answer.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            Self::GraphRecursionExceeded { .. }
                | Self::PlanStepAgentNotFound(_)
                | Self::InvalidPlan(_)
        )
    }
}
