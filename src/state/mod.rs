//! Checkpoint persistence layer
//!
//! Suspended runs are stored here keyed by session id and picked up again
//! on resume. Currently in-memory only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::SupervisorError;
use crate::models::GraphRunState;
use crate::Result;

/// Serialized snapshot of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: String,
    pub state: String,
    /// SHA-256 of `state`, hex encoded.
    pub hash: String,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn capture(state: &GraphRunState) -> Result<Self> {
        let serialized = serde_json::to_string(state)?;
        Ok(Self {
            session_id: state.session_id.clone(),
            hash: digest(&serialized),
            state: serialized,
            saved_at: Utc::now(),
        })
    }

    pub fn restore(&self) -> Result<GraphRunState> {
        if digest(&self.state) != self.hash {
            warn!(session_id = %self.session_id, "Checkpoint hash mismatch");
            return Err(SupervisorError::CheckpointCorrupted(self.session_id.clone()));
        }
        Ok(serde_json::from_str(&self.state)?)
    }
}

fn digest(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// Trait for checkpoint persistence
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, state: &GraphRunState) -> Result<()>;
    async fn load(&self, session_id: &str) -> Result<Option<GraphRunState>>;
    async fn remove(&self, session_id: &str) -> Result<bool>;
    /// Remove and return the checkpoint in one step. At most one caller
    /// receives a given checkpoint.
    async fn take(&self, session_id: &str) -> Result<Option<GraphRunState>>;
}

/// In-memory checkpoint store for development
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.checkpoints.read().await.len()
    }

    /// Raw access for integrity tests
    #[cfg(test)]
    async fn tamper(&self, session_id: &str, state: String) {
        if let Some(cp) = self.checkpoints.write().await.get_mut(session_id) {
            cp.state = state;
        }
    }
}

#[async_trait::async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, state: &GraphRunState) -> Result<()> {
        let checkpoint = Checkpoint::capture(state)?;
        debug!(session_id = %state.session_id, hash = %checkpoint.hash, "Checkpoint saved");

        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(state.session_id.clone(), checkpoint);
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<GraphRunState>> {
        let checkpoints = self.checkpoints.read().await;
        checkpoints.get(session_id).map(Checkpoint::restore).transpose()
    }

    async fn remove(&self, session_id: &str) -> Result<bool> {
        let mut checkpoints = self.checkpoints.write().await;
        Ok(checkpoints.remove(session_id).is_some())
    }

    async fn take(&self, session_id: &str) -> Result<Option<GraphRunState>> {
        let checkpoint = self.checkpoints.write().await.remove(session_id);
        checkpoint.as_ref().map(Checkpoint::restore).transpose()
    }
}
