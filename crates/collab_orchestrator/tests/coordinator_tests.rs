//! End-to-end tests for the collaboration coordinator

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use collab_orchestrator::{
    AgentDescriptor, AgentInstance, AgentInvokeError, AgentPriority, CollabError, CollabEvent,
    CollaborationCoordinator, CoordinatorConfig, EventListener, SessionStatus, TaskStatus,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("collab_orchestrator=debug")
        .with_test_writer()
        .try_init();
}

/// Always-succeeding agent with a fixed reported confidence.
struct StubAgent {
    confidence: f64,
}

#[async_trait]
impl AgentInstance for StubAgent {
    async fn invoke(&self, action: &str, params: Value) -> Result<Value, AgentInvokeError> {
        Ok(json!({
            "action": action,
            "confidence": self.confidence,
            "reasoning": [format!("{action} reviewed")],
            "context": params.get("context").cloned().unwrap_or(Value::Null),
        }))
    }
}

struct FailingAgent;

#[async_trait]
impl AgentInstance for FailingAgent {
    async fn invoke(&self, _action: &str, _params: Value) -> Result<Value, AgentInvokeError> {
        Err(AgentInvokeError::new("model backend unreachable"))
    }
}

/// Succeeds after a fixed delay; used for cancellation and timeout tests.
struct SlowAgent {
    delay: Duration,
}

#[async_trait]
impl AgentInstance for SlowAgent {
    async fn invoke(&self, action: &str, _params: Value) -> Result<Value, AgentInvokeError> {
        tokio::time::sleep(self.delay).await;
        Ok(json!({ "action": action, "confidence": 0.9 }))
    }
}

/// Collects every emitted event for later assertions.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<CollabEvent>>,
}

impl Recorder {
    fn kinds(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .expect("recorder lock")
            .iter()
            .map(|e| e.kind())
            .collect()
    }

    fn count(&self, kind: &str) -> usize {
        self.kinds().iter().filter(|k| **k == kind).count()
    }
}

impl EventListener for Recorder {
    fn on_event(&self, event: &CollabEvent) {
        self.events.lock().expect("recorder lock").push(event.clone());
    }
}

fn caps(labels: &[&str]) -> HashSet<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

/// Register the four stage agents with live stub instances.
async fn register_stage_agents(coordinator: &CollaborationCoordinator) {
    let agents = [
        ("xiaoai", "assess", 0.9),
        ("laoke", "diagnose", 0.8),
        ("xiaoke", "treat", 0.85),
        ("soer", "lifestyle", 0.95),
    ];
    for (id, capability, confidence) in agents {
        coordinator
            .register_agent(AgentDescriptor::new(
                id,
                id,
                [capability.to_string()],
                AgentPriority::High,
            ))
            .await;
        coordinator
            .register_instance(id, Arc::new(StubAgent { confidence }))
            .await;
    }
}

async fn wait_for_terminal(
    coordinator: &CollaborationCoordinator,
    task_id: uuid::Uuid,
) -> TaskStatus {
    for _ in 0..300 {
        if let Some(status) = coordinator.get_task_status(task_id).await {
            if status.is_terminal() {
                return status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {task_id} did not reach a terminal status");
}

#[tokio::test]
async fn full_pipeline_completes_and_aggregates() {
    init_tracing();
    let coordinator = CollaborationCoordinator::with_defaults();
    let recorder = Arc::new(Recorder::default());
    coordinator.subscribe(recorder.clone());
    register_stage_agents(&coordinator).await;

    let task_id = coordinator
        .submit(
            json!({"user_id": "u-1", "symptoms": ["fatigue"]}),
            caps(&["assess", "diagnose", "treat", "lifestyle"]),
            AgentPriority::High,
        )
        .await
        .expect("submit");

    assert_eq!(wait_for_terminal(&coordinator, task_id).await, TaskStatus::Completed);

    let task = coordinator.get_task(task_id).await.expect("task");
    assert_eq!(task.assigned_agents.len(), 4);
    let result = task.result.expect("result");
    // Mean over the four stage confidences: 0.9, 0.8, 0.85, 0.95
    assert!((result.confidence - 0.875).abs() < 1e-9);
    assert!(result.analysis.get("stage").is_some());
    assert_eq!(result.lifestyle["stage"], "lifestyle");
    // 3 base recommendations plus the capped 3 reasoning extras
    assert_eq!(result.recommendations.len(), 6);

    let session = coordinator
        .get_session(result.session_id)
        .await
        .expect("session");
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.consensus_reached);
    assert_eq!(session.decisions.len(), 4);
    // One decision per stage, in pipeline order
    let agents: Vec<&str> = session.decisions.iter().map(|d| d.agent_id.as_str()).collect();
    assert_eq!(agents, vec!["xiaoai", "laoke", "xiaoke", "soer"]);
    assert!(session
        .decisions
        .iter()
        .all(|d| (0.0..=1.0).contains(&d.confidence)));

    let stats = coordinator.get_statistics().await;
    assert_eq!(stats.total_tasks, 1);
    assert!((stats.success_rate - 1.0).abs() < 1e-9);
    assert!((stats.average_confidence - 0.875).abs() < 1e-9);
    assert_eq!(stats.active_sessions, 0);

    assert_eq!(recorder.count("task_created"), 1);
    assert_eq!(recorder.count("collaboration_started"), 4);
    assert_eq!(recorder.count("decision_recorded"), 4);
    assert_eq!(recorder.count("collaboration_completed"), 1);
    assert_eq!(recorder.count("collaboration_failed"), 0);
}

#[tokio::test]
async fn decision_events_follow_stage_order() {
    init_tracing();
    let coordinator = CollaborationCoordinator::with_defaults();
    let recorder = Arc::new(Recorder::default());
    coordinator.subscribe(recorder.clone());
    register_stage_agents(&coordinator).await;

    let task_id = coordinator
        .submit(
            json!({}),
            caps(&["assess", "diagnose", "treat", "lifestyle"]),
            AgentPriority::Medium,
        )
        .await
        .expect("submit");
    wait_for_terminal(&coordinator, task_id).await;

    let stages: Vec<String> = recorder
        .events
        .lock()
        .expect("recorder lock")
        .iter()
        .filter_map(|e| match e {
            CollabEvent::DecisionRecorded { stage, .. } => Some(stage.name().to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(stages, vec!["analysis", "diagnosis", "treatment", "lifestyle"]);
}

#[tokio::test]
async fn submit_without_matching_agent_creates_nothing() {
    init_tracing();
    let coordinator = CollaborationCoordinator::with_defaults();
    register_stage_agents(&coordinator).await;

    let err = coordinator
        .submit(json!({}), caps(&["telepathy"]), AgentPriority::Low)
        .await
        .expect_err("no matching agent");
    assert!(matches!(err, CollabError::NoSuitableAgent { .. }));

    assert!(coordinator.list_tasks().await.is_empty());
    assert!(coordinator.get_active_sessions().await.is_empty());
    assert_eq!(coordinator.get_statistics().await.total_tasks, 0);
}

#[tokio::test]
async fn assignment_orders_by_priority_then_registration() {
    init_tracing();
    let coordinator = CollaborationCoordinator::with_defaults();
    for (id, priority) in [
        ("low-agent", AgentPriority::Low),
        ("critical-agent", AgentPriority::Critical),
        ("medium-agent", AgentPriority::Medium),
    ] {
        coordinator
            .register_agent(AgentDescriptor::new(
                id,
                id,
                ["assess".to_string()],
                priority,
            ))
            .await;
        coordinator
            .register_instance(id, Arc::new(StubAgent { confidence: 0.9 }))
            .await;
    }

    let task_id = coordinator
        .submit(json!({}), caps(&["assess"]), AgentPriority::Medium)
        .await
        .expect("submit");

    let task = coordinator.get_task(task_id).await.expect("task");
    assert_eq!(
        task.assigned_agents,
        vec!["critical-agent", "medium-agent", "low-agent"]
    );
    // Every assigned agent intersects the required capabilities
    assert!(!task.assigned_agents.is_empty());

    // Only "assess" agents exist, so the diagnosis stage has no
    // designated agent and the pipeline fails closed.
    assert_eq!(wait_for_terminal(&coordinator, task_id).await, TaskStatus::Failed);
}

#[tokio::test]
async fn missing_instance_fails_pipeline_at_stage_two() {
    init_tracing();
    let coordinator = CollaborationCoordinator::with_defaults();
    let recorder = Arc::new(Recorder::default());
    coordinator.subscribe(recorder.clone());
    register_stage_agents(&coordinator).await;
    // Slow first stage so the deregistration lands before stage 2 runs
    coordinator
        .register_instance(
            "xiaoai",
            Arc::new(SlowAgent {
                delay: Duration::from_millis(100),
            }),
        )
        .await;

    let task_id = coordinator
        .submit(
            json!({}),
            caps(&["assess", "diagnose", "treat", "lifestyle"]),
            AgentPriority::High,
        )
        .await
        .expect("submit");
    assert!(coordinator.deregister_instance("laoke").await);

    assert_eq!(wait_for_terminal(&coordinator, task_id).await, TaskStatus::Failed);

    let task = coordinator.get_task(task_id).await.expect("task");
    assert!(task.result.is_none());
    assert!(coordinator.get_active_sessions().await.is_empty());

    // Only the analysis decision was recorded before the abort
    let failed_session = recorder
        .events
        .lock()
        .expect("recorder lock")
        .iter()
        .find_map(|e| match e {
            CollabEvent::CollaborationFailed { session_id, .. } => Some(*session_id),
            _ => None,
        })
        .expect("failed event");
    let session = coordinator.get_session(failed_session).await.expect("session");
    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.decisions.len(), 1);
    assert!(session.end_time.is_some());
    assert!(!session.consensus_reached);

    assert_eq!(recorder.count("collaboration_failed"), 1);
    assert_eq!(recorder.count("collaboration_completed"), 0);

    let stats = coordinator.get_statistics().await;
    assert_eq!(stats.failed_tasks, 1);
    assert_eq!(stats.average_confidence, 0.0);
}

#[tokio::test]
async fn failing_invocation_aborts_without_later_decisions() {
    init_tracing();
    let coordinator = CollaborationCoordinator::with_defaults();
    let recorder = Arc::new(Recorder::default());
    coordinator.subscribe(recorder.clone());
    register_stage_agents(&coordinator).await;
    coordinator
        .register_instance("laoke", Arc::new(FailingAgent))
        .await;

    let task_id = coordinator
        .submit(
            json!({}),
            caps(&["assess", "diagnose", "treat", "lifestyle"]),
            AgentPriority::High,
        )
        .await
        .expect("submit");

    assert_eq!(wait_for_terminal(&coordinator, task_id).await, TaskStatus::Failed);

    let error = recorder
        .events
        .lock()
        .expect("recorder lock")
        .iter()
        .find_map(|e| match e {
            CollabEvent::CollaborationFailed { error, session_id, .. } => {
                Some((error.clone(), *session_id))
            }
            _ => None,
        })
        .expect("failed event");
    assert!(error.0.contains("laoke"));

    let session = coordinator.get_session(error.1).await.expect("session");
    // Decision ledger stops at the analysis stage; no treatment or
    // lifestyle entries exist
    assert_eq!(session.decisions.len(), 1);
    assert_eq!(session.decisions[0].agent_id, "xiaoai");
    assert_eq!(recorder.count("decision_recorded"), 1);
}

#[tokio::test]
async fn invocation_timeout_fails_the_session() {
    init_tracing();
    let config = CoordinatorConfig {
        invoke_timeout_ms: 50,
        ..CoordinatorConfig::default()
    };
    let coordinator = CollaborationCoordinator::new(config);
    register_stage_agents(&coordinator).await;
    coordinator
        .register_instance(
            "xiaoai",
            Arc::new(SlowAgent {
                delay: Duration::from_millis(400),
            }),
        )
        .await;

    let task_id = coordinator
        .submit(
            json!({}),
            caps(&["assess", "diagnose", "treat", "lifestyle"]),
            AgentPriority::High,
        )
        .await
        .expect("submit");

    assert_eq!(wait_for_terminal(&coordinator, task_id).await, TaskStatus::Failed);
}

#[tokio::test]
async fn shutdown_cancels_active_session_exactly_once() {
    init_tracing();
    let coordinator = CollaborationCoordinator::with_defaults();
    let recorder = Arc::new(Recorder::default());
    coordinator.subscribe(recorder.clone());
    register_stage_agents(&coordinator).await;
    coordinator
        .register_instance(
            "xiaoai",
            Arc::new(SlowAgent {
                delay: Duration::from_millis(300),
            }),
        )
        .await;

    let task_id = coordinator
        .submit(
            json!({}),
            caps(&["assess", "diagnose", "treat", "lifestyle"]),
            AgentPriority::High,
        )
        .await
        .expect("submit");

    tokio::time::sleep(Duration::from_millis(50)).await;
    let active = coordinator.get_active_sessions().await;
    assert_eq!(active.len(), 1);
    let session_id = active[0].id;

    coordinator.shutdown().await;

    let session = coordinator.get_session(session_id).await.expect("session");
    assert_eq!(session.status, SessionStatus::Cancelled);
    assert!(session.end_time.is_some());
    assert_eq!(
        coordinator.get_task_status(task_id).await,
        Some(TaskStatus::Cancelled)
    );

    // Let the in-flight stage drain; the pipeline must not resurrect the
    // session or emit anything further
    tokio::time::sleep(Duration::from_millis(400)).await;
    let session = coordinator.get_session(session_id).await.expect("session");
    assert_eq!(session.status, SessionStatus::Cancelled);
    assert!(session.decisions.is_empty());
    assert_eq!(recorder.count("collaboration_cancelled"), 1);
    assert_eq!(recorder.count("collaboration_completed"), 0);
    assert_eq!(recorder.count("collaboration_failed"), 0);

    // Idempotent: nothing left to cancel
    coordinator.shutdown().await;
    assert_eq!(recorder.count("collaboration_cancelled"), 1);
}

#[tokio::test]
async fn concurrent_submissions_settle_independently() {
    init_tracing();
    let coordinator = CollaborationCoordinator::with_defaults();
    register_stage_agents(&coordinator).await;

    let mut ids = Vec::new();
    for i in 0..5 {
        let id = coordinator
            .submit(
                json!({"user_id": format!("u-{i}")}),
                caps(&["assess", "diagnose", "treat", "lifestyle"]),
                AgentPriority::Medium,
            )
            .await
            .expect("submit");
        ids.push(id);
    }

    for id in ids {
        assert_eq!(wait_for_terminal(&coordinator, id).await, TaskStatus::Completed);
    }

    let stats = coordinator.get_statistics().await;
    assert_eq!(stats.total_tasks, 5);
    assert_eq!(stats.completed_tasks, 5);
    assert!((stats.success_rate - 1.0).abs() < 1e-9);
}
