//! Pipeline executor - drives a session through the four fixed stages

use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use collab_core::{
    AgentInvokeError, CollabError, CollabEvent, CollaborationResult, CollaborationSession,
    CollaborationTask, EventMeta, EventNotifier, Result, SessionStatus, Stage, TaskStatus,
};

use crate::config::CoordinatorConfig;
use crate::queue::TaskQueue;
use crate::registry::AgentRegistry;
use crate::session::SessionManager;

/// Executes one session's pipeline as a single sequential unit of work:
/// analysis, diagnosis, treatment, lifestyle, strictly in order, with one
/// decision appended per stage. Any stage failure aborts the remainder
/// (fail-fast, no retries at this layer).
///
/// Cancellation is cooperative: an in-flight agent invocation is not
/// interrupted, the pipeline stops at the next stage boundary. This is a
/// known limitation, not a real-time guarantee.
pub struct PipelineExecutor {
    registry: AgentRegistry,
    queue: TaskQueue,
    sessions: SessionManager,
    notifier: EventNotifier,
    config: CoordinatorConfig,
}

impl PipelineExecutor {
    pub fn new(
        registry: AgentRegistry,
        queue: TaskQueue,
        sessions: SessionManager,
        notifier: EventNotifier,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            registry,
            queue,
            sessions,
            notifier,
            config,
        }
    }

    /// Run the full pipeline for one session. Failures never escape the
    /// coordinator: they are recorded on the task/session and emitted as
    /// a `collaboration_failed` event.
    pub async fn run(&self, task_id: Uuid, session_id: Uuid) {
        if let Err(err) = self.execute(task_id, session_id).await {
            self.record_failure(task_id, session_id, err).await;
        }
    }

    async fn execute(&self, task_id: Uuid, session_id: Uuid) -> Result<()> {
        let task = self
            .queue
            .get(task_id)
            .await
            .ok_or(CollabError::TaskNotFound(task_id))?;

        let mut stage_outputs = Map::new();
        for stage in Stage::ALL {
            let session = self
                .sessions
                .get(session_id)
                .await
                .ok_or(CollabError::SessionNotFound(session_id))?;
            if session.status != SessionStatus::Active {
                debug!(%session_id, status = session.status.as_str(), "session no longer active, stopping pipeline");
                return Ok(());
            }

            let record = self
                .run_stage(&task, &session, stage, &stage_outputs)
                .await?;
            stage_outputs.insert(stage.name().to_string(), record);
        }

        self.finish(task_id, session_id, stage_outputs).await
    }

    async fn run_stage(
        &self,
        task: &CollaborationTask,
        session: &CollaborationSession,
        stage: Stage,
        prior: &Map<String, Value>,
    ) -> Result<Value> {
        let primary = self.participant_with_capability(session, stage.capability()).await?;
        info!(session_id = %session.id, stage = stage.name(), agent_id = %primary, "running pipeline stage");

        let params = json!({
            "context": task.context,
            "prior": prior,
        });
        let output = self
            .invoke_with_timeout(&primary, stage.action(), params)
            .await?;

        // Second pair of eyes on diagnosis and treatment; a review failure
        // aborts the stage like any other invocation failure.
        let mut supporting_data = None;
        if let Some((capability, action)) = stage.review() {
            let reviewer = self.participant_with_capability(session, capability).await?;
            let mut review_params = Map::new();
            review_params.insert("context".to_string(), task.context.clone());
            review_params.insert(stage.name().to_string(), output.clone());
            let review = self
                .invoke_with_timeout(&reviewer, action, Value::Object(review_params))
                .await?;
            supporting_data = Some(json!({
                "reviewer": reviewer,
                "review": review,
            }));
        }

        // Boundary validation of the opaque agent payload
        let confidence = extract_confidence(&output).unwrap_or_else(|| stage.fallback_confidence());
        let reasoning = extract_reasoning(&output).unwrap_or_else(|| stage.default_reasoning());
        let decision_text = extract_decision_text(&output)
            .unwrap_or_else(|| format!("{} stage completed", stage.name()));

        let decision = self
            .sessions
            .record_decision(
                session.id,
                &primary,
                decision_text,
                confidence,
                reasoning,
                supporting_data,
            )
            .await?;
        self.notifier.emit(CollabEvent::DecisionRecorded {
            meta: EventMeta::new(),
            session_id: session.id,
            decision_id: decision.id,
            agent_id: primary,
            stage,
            confidence: decision.confidence,
        });

        Ok(stage_record(stage, output))
    }

    async fn finish(
        &self,
        task_id: Uuid,
        session_id: Uuid,
        mut stage_outputs: Map<String, Value>,
    ) -> Result<()> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .ok_or(CollabError::SessionNotFound(session_id))?;
        if session.status != SessionStatus::Active {
            // Shutdown raced the last stage
            return Ok(());
        }

        let recommendations = self.collect_recommendations(&session);
        let confidence = self.sessions.complete(session_id).await?;
        let result = CollaborationResult {
            analysis: take_stage(&mut stage_outputs, Stage::Analysis),
            diagnosis: take_stage(&mut stage_outputs, Stage::Diagnosis),
            treatment: take_stage(&mut stage_outputs, Stage::Treatment),
            lifestyle: take_stage(&mut stage_outputs, Stage::Lifestyle),
            confidence,
            recommendations,
            session_id,
            completed_at: Utc::now(),
        };
        self.queue.complete(task_id, result).await?;

        info!(%task_id, %session_id, confidence, "collaboration completed");
        self.notifier.emit(CollabEvent::CollaborationCompleted {
            meta: EventMeta::new(),
            session_id,
            task_id,
        });
        Ok(())
    }

    /// Base recommendations plus up to `max_extra_recommendations`
    /// deduplicated reasoning entries from all recorded decisions, in
    /// first-seen order.
    fn collect_recommendations(&self, session: &CollaborationSession) -> Vec<String> {
        let mut recommendations = self.config.base_recommendations.clone();
        let mut extra = 0;
        for decision in &session.decisions {
            for line in &decision.reasoning {
                if extra == self.config.max_extra_recommendations {
                    return recommendations;
                }
                if !recommendations.contains(line) {
                    recommendations.push(line.clone());
                    extra += 1;
                }
            }
        }
        recommendations
    }

    /// First participant (in assignment order) whose descriptor holds the
    /// capability.
    async fn participant_with_capability(
        &self,
        session: &CollaborationSession,
        capability: &str,
    ) -> Result<String> {
        for agent_id in &session.participants {
            if let Some(descriptor) = self.registry.get(agent_id).await {
                if descriptor.has_capability(capability) {
                    return Ok(agent_id.clone());
                }
            }
        }
        Err(CollabError::NoSuitableAgent {
            required: vec![capability.to_string()],
        })
    }

    async fn invoke_with_timeout(
        &self,
        agent_id: &str,
        action: &str,
        params: Value,
    ) -> Result<Value> {
        let limit = Duration::from_millis(self.config.invoke_timeout_ms);
        match tokio::time::timeout(limit, self.registry.invoke(agent_id, action, params)).await {
            Ok(result) => result,
            Err(_) => Err(CollabError::AgentInvocation {
                agent_id: agent_id.to_string(),
                source: AgentInvokeError::new(format!(
                    "timed out after {}ms",
                    self.config.invoke_timeout_ms
                )),
            }),
        }
    }

    async fn record_failure(&self, task_id: Uuid, session_id: Uuid, err: CollabError) {
        // `fail` succeeds only while the session is still active, so a
        // shutdown that cancelled it first wins: the cancellation already
        // settled task and session, and no failure event may follow.
        if self.sessions.fail(session_id).await.is_err() {
            debug!(%session_id, "pipeline error after session settled, ignored");
            return;
        }
        warn!(%task_id, %session_id, error = %err, "collaboration failed");

        if let Err(e) = self.queue.set_status(task_id, TaskStatus::Failed).await {
            warn!(%task_id, error = %e, "could not mark task failed");
        }
        self.notifier.emit(CollabEvent::CollaborationFailed {
            meta: EventMeta::new(),
            session_id,
            task_id,
            error: err.to_string(),
        });
    }
}

/// Stage result record: the agent payload plus `stage` and `timestamp`.
fn stage_record(stage: Stage, output: Value) -> Value {
    let mut record = match output {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("output".to_string(), other);
            map
        }
    };
    record.insert("stage".to_string(), json!(stage.name()));
    record.insert("timestamp".to_string(), json!(Utc::now()));
    Value::Object(record)
}

fn take_stage(outputs: &mut Map<String, Value>, stage: Stage) -> Value {
    outputs.remove(stage.name()).unwrap_or(Value::Null)
}

fn extract_confidence(output: &Value) -> Option<f64> {
    output
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c.clamp(0.0, 1.0))
}

fn extract_reasoning(output: &Value) -> Option<Vec<String>> {
    let lines: Vec<String> = output
        .get("reasoning")?
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines)
    }
}

fn extract_decision_text(output: &Value) -> Option<String> {
    output
        .get("decision")
        .or_else(|| output.get("summary"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
