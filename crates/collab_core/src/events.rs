//! Lifecycle event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Stage;

/// Metadata attached to every collaboration event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMeta {
    /// Unique event ID (UUID v4)
    pub event_id: Uuid,
    /// When the event occurred
    pub occurred_at: DateTime<Utc>,
}

impl EventMeta {
    pub fn new() -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }
}

impl Default for EventMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Closed set of lifecycle events emitted by the coordinator.
///
/// Each transition emits its event exactly once; `CollaborationStarted`
/// is emitted once per session participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollabEvent {
    AgentRegistered {
        meta: EventMeta,
        agent_id: String,
    },
    TaskCreated {
        meta: EventMeta,
        task_id: Uuid,
    },
    CollaborationStarted {
        meta: EventMeta,
        session_id: Uuid,
        task_id: Uuid,
        agent_id: String,
    },
    DecisionRecorded {
        meta: EventMeta,
        session_id: Uuid,
        decision_id: Uuid,
        agent_id: String,
        stage: Stage,
        confidence: f64,
    },
    CollaborationCompleted {
        meta: EventMeta,
        session_id: Uuid,
        task_id: Uuid,
    },
    CollaborationFailed {
        meta: EventMeta,
        session_id: Uuid,
        task_id: Uuid,
        error: String,
    },
    CollaborationCancelled {
        meta: EventMeta,
        session_id: Uuid,
        task_id: Uuid,
    },
}

impl CollabEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            CollabEvent::AgentRegistered { .. } => "agent_registered",
            CollabEvent::TaskCreated { .. } => "task_created",
            CollabEvent::CollaborationStarted { .. } => "collaboration_started",
            CollabEvent::DecisionRecorded { .. } => "decision_recorded",
            CollabEvent::CollaborationCompleted { .. } => "collaboration_completed",
            CollabEvent::CollaborationFailed { .. } => "collaboration_failed",
            CollabEvent::CollaborationCancelled { .. } => "collaboration_cancelled",
        }
    }
}
