//! Agent Supervisor
//!
//! A multi-agent orchestration sandbox:
//! - A supervisor routes each query to a specialist (weather, geography)
//! - Failed decisions downgrade to a secondary model for the rest of the run
//! - Plans can be made up front and executed step by step
//! - Low-confidence answers pause the run until a reviewer resumes it
//!
//! REACTIVE LOOP:
//! ROUTING → RUNNING_SPECIALIST → (CHECKING → SUSPENDED?) → ROUTING … → DONE
//!
//! PLANNED LOOP:
//! PLANNING → EXECUTING_STEP* → RESPONDING → DONE

pub mod agents;
pub mod api;
pub mod config;
pub mod decision;
pub mod error;
pub mod execution;
pub mod gemini;
pub mod graph;
pub mod interrupt;
pub mod lookup;
pub mod models;
pub mod orchestrator;
pub mod planner;
pub mod retry;
pub mod router;
pub mod state;

pub use error::{Result, SupervisorError};

// Re-export common types
pub use models::*;
pub use orchestrator::{Orchestrator, Strategy};
