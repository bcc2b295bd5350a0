//! Collaboration coordinator - the caller-facing surface

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use collab_core::{
    AgentDescriptor, AgentInstance, AgentPriority, CollabError, CollabEvent, CollaborationSession,
    CollaborationTask, EventListener, EventMeta, EventNotifier, Result, TaskStatus,
};

use crate::config::CoordinatorConfig;
use crate::pipeline::PipelineExecutor;
use crate::queue::TaskQueue;
use crate::registry::AgentRegistry;
use crate::session::SessionManager;
use crate::stats::{CollaborationStatistics, StatisticsReporter};

/// Explicit per-process coordinator object wiring registry, queue,
/// sessions, pipeline, events, and statistics. Constructed once and
/// passed by handle to callers - there is no ambient global instance.
/// Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct CollaborationCoordinator {
    registry: AgentRegistry,
    queue: TaskQueue,
    sessions: SessionManager,
    notifier: EventNotifier,
    stats: StatisticsReporter,
    config: CoordinatorConfig,
}

impl CollaborationCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        let registry = AgentRegistry::new();
        let queue = TaskQueue::new();
        let sessions = SessionManager::new();
        Self {
            stats: StatisticsReporter::new(queue.clone(), sessions.clone()),
            registry,
            queue,
            sessions,
            notifier: EventNotifier::new(),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CoordinatorConfig::default())
    }

    // ------------------------------------------------------------------
    // Agent management
    // ------------------------------------------------------------------

    /// Register (or replace) an agent descriptor.
    pub async fn register_agent(&self, descriptor: AgentDescriptor) {
        let agent_id = descriptor.id.clone();
        self.registry.register(descriptor).await;
        self.notifier.emit(CollabEvent::AgentRegistered {
            meta: EventMeta::new(),
            agent_id,
        });
    }

    /// Attach a live invocation handle to a registered agent id.
    pub async fn register_instance(&self, agent_id: &str, handle: Arc<dyn AgentInstance>) {
        self.registry.register_instance(agent_id, handle).await;
    }

    pub async fn deregister_agent(&self, agent_id: &str) -> bool {
        self.registry.deregister(agent_id).await
    }

    pub async fn deregister_instance(&self, agent_id: &str) -> bool {
        self.registry.deregister_instance(agent_id).await
    }

    pub async fn update_agent_status(&self, agent_id: &str, status: &str) -> bool {
        self.registry.update_status(agent_id, status).await
    }

    pub async fn agent_status(&self, agent_id: &str) -> Option<String> {
        self.registry.get_status(agent_id).await
    }

    /// Register a listener for subsequent lifecycle events.
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.notifier.subscribe(listener);
    }

    // ------------------------------------------------------------------
    // Task lifecycle
    // ------------------------------------------------------------------

    /// Submit a collaboration task. Synchronous up to task creation: when
    /// no active agent matches any required capability this fails with
    /// `NoSuitableAgent` and nothing is created. Otherwise the task is
    /// queued, its session started, and the pipeline runs on its own
    /// tokio task; the returned id is valid for polling immediately.
    pub async fn submit(
        &self,
        context: Value,
        required_capabilities: HashSet<String>,
        priority: AgentPriority,
    ) -> Result<Uuid> {
        let assigned = self.registry.find_suitable(&required_capabilities).await;
        if assigned.is_empty() {
            let mut required: Vec<String> = required_capabilities.into_iter().collect();
            required.sort();
            return Err(CollabError::NoSuitableAgent { required });
        }

        let task = CollaborationTask::new(context, required_capabilities, priority, assigned.clone());
        let task_id = task.id;
        self.queue.insert(task).await;
        self.notifier.emit(CollabEvent::TaskCreated {
            meta: EventMeta::new(),
            task_id,
        });

        let session = self.sessions.create(task_id, assigned).await?;
        for agent_id in &session.participants {
            self.notifier.emit(CollabEvent::CollaborationStarted {
                meta: EventMeta::new(),
                session_id: session.id,
                task_id,
                agent_id: agent_id.clone(),
            });
        }
        self.queue.set_status(task_id, TaskStatus::InProgress).await?;
        info!(%task_id, session_id = %session.id, "collaboration task submitted");

        let executor = PipelineExecutor::new(
            self.registry.clone(),
            self.queue.clone(),
            self.sessions.clone(),
            self.notifier.clone(),
            self.config.clone(),
        );
        let session_id = session.id;
        tokio::spawn(async move {
            executor.run(task_id, session_id).await;
        });

        Ok(task_id)
    }

    pub async fn get_task(&self, task_id: Uuid) -> Option<CollaborationTask> {
        self.queue.get(task_id).await
    }

    pub async fn get_task_status(&self, task_id: Uuid) -> Option<TaskStatus> {
        self.queue.get(task_id).await.map(|t| t.status)
    }

    pub async fn list_tasks(&self) -> Vec<CollaborationTask> {
        self.queue.list().await
    }

    pub async fn get_session(&self, session_id: Uuid) -> Option<CollaborationSession> {
        self.sessions.get(session_id).await
    }

    pub async fn get_active_sessions(&self) -> Vec<CollaborationSession> {
        self.sessions.active_sessions().await
    }

    pub async fn get_statistics(&self) -> CollaborationStatistics {
        self.stats.report().await
    }

    /// Cancel every active session. Cancellation is cooperative: running
    /// pipelines notice it at their next stage boundary; in-flight agent
    /// invocations are not interrupted. Emits one
    /// `collaboration_cancelled` event per cancelled session.
    pub async fn shutdown(&self) {
        let cancelled = self.sessions.cancel_all().await;
        for (session_id, task_id) in &cancelled {
            if let Err(e) = self.queue.set_status(*task_id, TaskStatus::Cancelled).await {
                info!(task_id = %task_id, error = %e, "task already settled during shutdown");
            }
            self.notifier.emit(CollabEvent::CollaborationCancelled {
                meta: EventMeta::new(),
                session_id: *session_id,
                task_id: *task_id,
            });
        }
        info!(cancelled = cancelled.len(), "coordinator shut down");
    }
}
