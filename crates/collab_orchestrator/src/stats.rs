//! Statistics reporter - read-only aggregation over tasks and sessions

use serde::{Deserialize, Serialize};

use collab_core::TaskStatus;

use crate::queue::TaskQueue;
use crate::session::SessionManager;

/// Aggregate metrics over the task history, computed on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollaborationStatistics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub active_sessions: usize,
    /// completed / total, 0 when no tasks exist
    pub success_rate: f64,
    /// Mean of `result.confidence` over completed tasks, 0 when none
    pub average_confidence: f64,
}

/// Pure read-only view over the live collections; one O(n) pass per call,
/// never stale relative to the last committed mutation.
#[derive(Clone)]
pub struct StatisticsReporter {
    queue: TaskQueue,
    sessions: SessionManager,
}

impl StatisticsReporter {
    pub fn new(queue: TaskQueue, sessions: SessionManager) -> Self {
        Self { queue, sessions }
    }

    pub async fn report(&self) -> CollaborationStatistics {
        let tasks = self.queue.list().await;
        let total_tasks = tasks.len();
        let mut completed_tasks = 0;
        let mut failed_tasks = 0;
        let mut confidence_sum = 0.0;

        for task in &tasks {
            match task.status {
                TaskStatus::Completed => {
                    completed_tasks += 1;
                    if let Some(result) = &task.result {
                        confidence_sum += result.confidence;
                    }
                }
                TaskStatus::Failed => failed_tasks += 1,
                _ => {}
            }
        }

        let success_rate = if total_tasks == 0 {
            0.0
        } else {
            completed_tasks as f64 / total_tasks as f64
        };
        let average_confidence = if completed_tasks == 0 {
            0.0
        } else {
            confidence_sum / completed_tasks as f64
        };

        CollaborationStatistics {
            total_tasks,
            completed_tasks,
            failed_tasks,
            active_sessions: self.sessions.active_count().await,
            success_rate,
            average_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use collab_core::{AgentPriority, CollaborationResult, CollaborationTask};
    use serde_json::json;
    use uuid::Uuid;

    fn task() -> CollaborationTask {
        CollaborationTask::new(
            json!({}),
            ["assess".to_string()].into_iter().collect(),
            AgentPriority::Medium,
            vec!["xiaoai".to_string()],
        )
    }

    fn result(confidence: f64) -> CollaborationResult {
        CollaborationResult {
            analysis: json!({}),
            diagnosis: json!({}),
            treatment: json!({}),
            lifestyle: json!({}),
            confidence,
            recommendations: vec![],
            session_id: Uuid::new_v4(),
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_empty_history_reports_zeroes() {
        let reporter = StatisticsReporter::new(TaskQueue::new(), SessionManager::new());
        let stats = reporter.report().await;
        assert_eq!(stats.total_tasks, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.average_confidence, 0.0);
    }

    #[tokio::test]
    async fn test_mixed_outcomes() {
        let queue = TaskQueue::new();
        let sessions = SessionManager::new();

        let done = task();
        let done_id = done.id;
        queue.insert(done).await;
        queue.complete(done_id, result(0.9)).await.expect("complete");

        let also_done = task();
        let also_done_id = also_done.id;
        queue.insert(also_done).await;
        queue
            .complete(also_done_id, result(0.7))
            .await
            .expect("complete");

        let broken = task();
        let broken_id = broken.id;
        queue.insert(broken).await;
        queue
            .set_status(broken_id, collab_core::TaskStatus::Failed)
            .await
            .expect("fail");

        // One session still running
        sessions
            .create(Uuid::new_v4(), vec!["xiaoai".to_string()])
            .await
            .expect("session");

        let stats = StatisticsReporter::new(queue, sessions).report().await;
        assert_eq!(stats.total_tasks, 3);
        assert_eq!(stats.completed_tasks, 2);
        assert_eq!(stats.failed_tasks, 1);
        assert_eq!(stats.active_sessions, 1);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-9);
        // Failed tasks are excluded from the confidence mean
        assert!((stats.average_confidence - 0.8).abs() < 1e-9);
    }
}
