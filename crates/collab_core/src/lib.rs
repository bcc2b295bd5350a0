//! # Collab Core
//!
//! Shared contract of the multi-agent collaboration framework: the data
//! model (agents, tasks, sessions, decisions), the error taxonomy, the
//! typed lifecycle events with their notifier, and the agent invocation
//! trait implemented by external collaborators.

pub mod agent;
pub mod error;
pub mod events;
pub mod notifier;
pub mod types;

// Re-exports
pub use agent::AgentInstance;
pub use error::{AgentInvokeError, CollabError, Result};
pub use events::{CollabEvent, EventMeta};
pub use notifier::{EventListener, EventNotifier};
pub use types::{
    AgentDescriptor, AgentPriority, CollaborationDecision, CollaborationResult,
    CollaborationSession, CollaborationTask, SessionStatus, Stage, TaskStatus,
    AGENT_STATUS_ACTIVE,
};
