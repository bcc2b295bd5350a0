//! Error types for the collaboration framework

use thiserror::Error;
use uuid::Uuid;

/// Error returned by an agent implementation's `invoke` call.
///
/// Agents surface whatever went wrong (transport, validation, internal
/// reasoning) as a message; the coordinator wraps it into
/// [`CollabError::AgentInvocation`] and fails the owning session.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AgentInvokeError {
    pub message: String,
}

impl AgentInvokeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CollabError {
    /// No registered active agent matches any of the required capabilities.
    /// Raised at submission time (the task is never created) and during
    /// stage execution when no participant holds the stage capability.
    #[error("no active agent matches required capabilities: {required:?}")]
    NoSuitableAgent { required: Vec<String> },

    /// The designated agent has no live invocable instance. The pipeline
    /// fails closed instead of fabricating a response.
    #[error("agent '{agent_id}' has no live instance")]
    AgentUnavailable { agent_id: String },

    /// An agent's `invoke` call failed (including per-invocation timeout).
    #[error("invocation of agent '{agent_id}' failed")]
    AgentInvocation {
        agent_id: String,
        #[source]
        source: AgentInvokeError,
    },

    /// Operation attempted against a task or session already in a
    /// terminal state.
    #[error("{entity} {id} is in terminal state '{status}'")]
    InvalidState {
        entity: &'static str,
        id: Uuid,
        status: String,
    },

    #[error("task {0} not found")]
    TaskNotFound(Uuid),

    #[error("session {0} not found")]
    SessionNotFound(Uuid),
}

pub type Result<T> = std::result::Result<T, CollabError>;
