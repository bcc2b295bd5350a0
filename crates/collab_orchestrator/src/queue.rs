//! Task queue - insertion-ordered store of submitted collaboration tasks

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use collab_core::{CollabError, CollaborationResult, CollaborationTask, Result, TaskStatus};

#[derive(Default)]
struct QueueInner {
    tasks: HashMap<Uuid, CollaborationTask>,
    /// Submission order, for `list`
    order: Vec<Uuid>,
}

/// Holds every submitted task for the lifetime of the process. Tasks are
/// never dropped implicitly; status and result mutate only through the
/// terminal-guarded operations below.
#[derive(Clone, Default)]
pub struct TaskQueue {
    inner: Arc<RwLock<QueueInner>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, task: CollaborationTask) {
        let mut inner = self.inner.write().await;
        inner.order.push(task.id);
        inner.tasks.insert(task.id, task);
    }

    pub async fn get(&self, task_id: Uuid) -> Option<CollaborationTask> {
        self.inner.read().await.tasks.get(&task_id).cloned()
    }

    pub async fn list(&self) -> Vec<CollaborationTask> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id).cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.tasks.is_empty()
    }

    /// Transition a task's status. Rejects any mutation of a task already
    /// in a terminal state.
    pub async fn set_status(&self, task_id: Uuid, status: TaskStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or(CollabError::TaskNotFound(task_id))?;
        if task.status.is_terminal() {
            return Err(CollabError::InvalidState {
                entity: "task",
                id: task_id,
                status: task.status.as_str().to_string(),
            });
        }
        debug!(%task_id, from = task.status.as_str(), to = status.as_str(), "task status change");
        task.status = status;
        task.updated_at = Some(Utc::now());
        Ok(())
    }

    /// Mark a task completed and attach its aggregated result.
    pub async fn complete(&self, task_id: Uuid, result: CollaborationResult) -> Result<()> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&task_id)
            .ok_or(CollabError::TaskNotFound(task_id))?;
        if task.status.is_terminal() {
            return Err(CollabError::InvalidState {
                entity: "task",
                id: task_id,
                status: task.status.as_str().to_string(),
            });
        }
        let now = Utc::now();
        task.status = TaskStatus::Completed;
        task.result = Some(result);
        task.updated_at = Some(now);
        task.completed_at = Some(now);
        Ok(())
    }
}
