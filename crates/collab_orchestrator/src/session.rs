//! Session manager - per-task collaboration session state and decision ledger

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use collab_core::{
    CollabError, CollaborationDecision, CollaborationSession, Result, SessionStatus,
};

/// Creates and tracks one collaboration session per task. Owns session
/// state and the append-only decision ledger; every mutation is guarded
/// against terminal states. Sessions are retained until shutdown - there
/// is no eviction.
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<Uuid, CollaborationSession>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for a task with the given participant snapshot.
    /// An empty participant list is a creation-time error.
    pub async fn create(&self, task_id: Uuid, participants: Vec<String>) -> Result<CollaborationSession> {
        if participants.is_empty() {
            return Err(CollabError::NoSuitableAgent { required: vec![] });
        }
        let session = CollaborationSession::new(task_id, participants);
        info!(session_id = %session.id, %task_id, participants = session.participants.len(), "session created");
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(session)
    }

    pub async fn get(&self, session_id: Uuid) -> Option<CollaborationSession> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    pub async fn active_sessions(&self) -> Vec<CollaborationSession> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .cloned()
            .collect()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .count()
    }

    /// Append one decision to an active session's ledger. The decision is
    /// constructed here so its `session_id` back-reference always matches
    /// the owning session.
    pub async fn record_decision(
        &self,
        session_id: Uuid,
        agent_id: &str,
        decision: String,
        confidence: f64,
        reasoning: Vec<String>,
        supporting_data: Option<Value>,
    ) -> Result<CollaborationDecision> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(CollabError::SessionNotFound(session_id))?;
        if session.status.is_terminal() {
            return Err(CollabError::InvalidState {
                entity: "session",
                id: session_id,
                status: session.status.as_str().to_string(),
            });
        }
        let mut record =
            CollaborationDecision::new(session_id, agent_id, decision, confidence, reasoning);
        if let Some(data) = supporting_data {
            record = record.with_supporting_data(data);
        }
        session.decisions.push(record.clone());
        debug!(%session_id, agent_id, confidence = record.confidence, "decision recorded");
        Ok(record)
    }

    /// Mark a session completed. All stages finished without failure, so
    /// consensus is reached; returns the aggregate confidence.
    pub async fn complete(&self, session_id: Uuid) -> Result<f64> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(CollabError::SessionNotFound(session_id))?;
        if session.status.is_terminal() {
            return Err(CollabError::InvalidState {
                entity: "session",
                id: session_id,
                status: session.status.as_str().to_string(),
            });
        }
        session.status = SessionStatus::Completed;
        session.end_time = Some(Utc::now());
        session.consensus_reached = true;
        Ok(session.aggregate_confidence())
    }

    pub async fn fail(&self, session_id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or(CollabError::SessionNotFound(session_id))?;
        if session.status.is_terminal() {
            return Err(CollabError::InvalidState {
                entity: "session",
                id: session_id,
                status: session.status.as_str().to_string(),
            });
        }
        session.status = SessionStatus::Failed;
        session.end_time = Some(Utc::now());
        Ok(())
    }

    /// Cancel every active session (shutdown path). Returns the
    /// `(session_id, task_id)` pairs that were actually cancelled, so the
    /// caller can emit exactly one cancellation event per session.
    pub async fn cancel_all(&self) -> Vec<(Uuid, Uuid)> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        let mut cancelled = Vec::new();
        for session in sessions.values_mut() {
            if session.status == SessionStatus::Active {
                session.status = SessionStatus::Cancelled;
                session.end_time = Some(now);
                cancelled.push((session.id, session.task_id));
            }
        }
        cancelled
    }
}
