//! # Collab Orchestrator
//!
//! Coordinates multi-agent health collaboration tasks. A submitted task
//! is assigned to capability-matched agents, bound to one collaboration
//! session, and driven through the fixed four-stage pipeline
//! (analysis -> diagnosis -> treatment -> lifestyle), with one decision
//! recorded per stage and lifecycle events emitted for every transition.
//!
//! Components:
//! - [`AgentRegistry`]: known agents, capabilities, live instances
//! - [`TaskQueue`]: submitted tasks and their assignment/result
//! - [`SessionManager`]: per-task session state and decision ledger
//! - [`PipelineExecutor`]: stage execution and result aggregation
//! - [`StatisticsReporter`]: read-only metrics over the task history
//! - [`CollaborationCoordinator`]: the caller-facing surface tying the
//!   above together

pub mod config;
pub mod coordinator;
pub mod pipeline;
pub mod queue;
pub mod registry;
pub mod session;
pub mod stats;

// Re-exports
pub use config::CoordinatorConfig;
pub use coordinator::CollaborationCoordinator;
pub use pipeline::PipelineExecutor;
pub use queue::TaskQueue;
pub use registry::AgentRegistry;
pub use session::SessionManager;
pub use stats::{CollaborationStatistics, StatisticsReporter};

// Re-export the shared contract for downstream callers
pub use collab_core::{
    AgentDescriptor, AgentInstance, AgentInvokeError, AgentPriority, CollabError, CollabEvent,
    CollaborationDecision, CollaborationResult, CollaborationSession, CollaborationTask,
    EventListener, EventMeta, EventNotifier, Result, SessionStatus, Stage, TaskStatus,
};
