//! Core data structures: agents, tasks, sessions, decisions

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Status value that makes an agent eligible for task assignment.
pub const AGENT_STATUS_ACTIVE: &str = "active";

/// Agent priority, used to rank capability matches during assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl AgentPriority {
    /// Numeric rank: critical=4, high=3, medium=2, low=1.
    pub fn rank(&self) -> u8 {
        match self {
            AgentPriority::Low => 1,
            AgentPriority::Medium => 2,
            AgentPriority::High => 3,
            AgentPriority::Critical => 4,
        }
    }
}

impl Default for AgentPriority {
    fn default() -> Self {
        Self::Medium
    }
}

/// Registered agent description - identity, capabilities, and health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Stable agent ID (e.g., "xiaoai")
    pub id: String,

    /// Display name
    pub name: String,

    /// Capability labels this agent advertises (e.g., "diagnose")
    pub capabilities: HashSet<String>,

    /// Assignment priority
    pub priority: AgentPriority,

    /// Free-form status; only [`AGENT_STATUS_ACTIVE`] agents are assignable
    pub status: String,

    /// Most recent reported load, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<f32>,

    /// Latency of the most recent successful invocation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

impl AgentDescriptor {
    /// Create an active descriptor with no load/latency history.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        capabilities: impl IntoIterator<Item = String>,
        priority: AgentPriority,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capabilities: capabilities.into_iter().collect(),
            priority,
            status: AGENT_STATUS_ACTIVE.to_string(),
            load: None,
            response_time_ms: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AGENT_STATUS_ACTIVE
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Non-empty intersection with the required set (not a full superset).
    pub fn matches_any(&self, required: &HashSet<String>) -> bool {
        required.iter().any(|c| self.capabilities.contains(c))
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

/// The four fixed pipeline stages, executed strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Analysis,
    Diagnosis,
    Treatment,
    Lifestyle,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Analysis,
        Stage::Diagnosis,
        Stage::Treatment,
        Stage::Lifestyle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Analysis => "analysis",
            Stage::Diagnosis => "diagnosis",
            Stage::Treatment => "treatment",
            Stage::Lifestyle => "lifestyle",
        }
    }

    /// Capability the designated stage agent must advertise.
    pub fn capability(&self) -> &'static str {
        match self {
            Stage::Analysis => "assess",
            Stage::Diagnosis => "diagnose",
            Stage::Treatment => "treat",
            Stage::Lifestyle => "lifestyle",
        }
    }

    /// Action name passed to the primary agent's `invoke`.
    pub fn action(&self) -> &'static str {
        match self {
            Stage::Analysis => "analyze_health_data",
            Stage::Diagnosis => "diagnose_condition",
            Stage::Treatment => "plan_treatment",
            Stage::Lifestyle => "recommend_lifestyle",
        }
    }

    /// Secondary invocation for stages with a second pair of eyes:
    /// diagnosis is reviewed by the assessment agent, treatment is
    /// validated by the diagnosis agent. Returns (capability, action).
    pub fn review(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Stage::Diagnosis => Some(("assess", "review_diagnosis")),
            Stage::Treatment => Some(("diagnose", "validate_treatment")),
            _ => None,
        }
    }

    /// Confidence used when the agent payload reports none.
    pub fn fallback_confidence(&self) -> f64 {
        match self {
            Stage::Analysis => 0.85,
            Stage::Diagnosis => 0.80,
            Stage::Treatment => 0.82,
            Stage::Lifestyle => 0.88,
        }
    }

    /// Reasoning recorded when the agent payload carries none.
    pub fn default_reasoning(&self) -> Vec<String> {
        let lines: &[&str] = match self {
            Stage::Analysis => &[
                "Collected health data reviewed for completeness",
                "Key symptoms and vitals extracted for downstream stages",
            ],
            Stage::Diagnosis => &[
                "Condition assessed against the gathered health profile",
                "Findings cross-checked by the assessment agent",
            ],
            Stage::Treatment => &[
                "Treatment options weighed against the diagnosed condition",
                "Plan validated against the diagnostic findings",
            ],
            Stage::Lifestyle => &[
                "Daily-routine adjustments matched to the treatment plan",
            ],
        };
        lines.iter().map(|s| s.to_string()).collect()
    }
}

/// Aggregated output of a successfully completed collaboration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationResult {
    pub analysis: Value,
    pub diagnosis: Value,
    pub treatment: Value,
    pub lifestyle: Value,
    /// Arithmetic mean of all recorded decision confidences
    pub confidence: f64,
    pub recommendations: Vec<String>,
    pub session_id: Uuid,
    pub completed_at: DateTime<Utc>,
}

/// A submitted collaboration task and its assignment/result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationTask {
    pub id: Uuid,

    /// Opaque caller payload, copied verbatim into stage parameters
    pub context: Value,

    pub required_capabilities: HashSet<String>,

    pub priority: AgentPriority,

    pub status: TaskStatus,

    /// Capability-matched agents, in assignment order
    pub assigned_agents: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CollaborationResult>,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl CollaborationTask {
    pub fn new(
        context: Value,
        required_capabilities: HashSet<String>,
        priority: AgentPriority,
        assigned_agents: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            context,
            required_capabilities,
            priority,
            status: TaskStatus::Pending,
            assigned_agents,
            result: None,
            created_at: Utc::now(),
            updated_at: None,
            completed_at: None,
        }
    }
}

/// An immutable, timestamped record of one stage's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationDecision {
    pub id: Uuid,

    /// Back-reference to the owning session
    pub session_id: Uuid,

    /// Agent that produced the stage output
    pub agent_id: String,

    /// Short free-text label of what was decided
    pub decision: String,

    /// Always within [0, 1]; clamped at construction
    pub confidence: f64,

    pub reasoning: Vec<String>,

    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub supporting_data: Option<Value>,
}

impl CollaborationDecision {
    pub fn new(
        session_id: Uuid,
        agent_id: impl Into<String>,
        decision: impl Into<String>,
        confidence: f64,
        reasoning: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            agent_id: agent_id.into(),
            decision: decision.into(),
            confidence: confidence.clamp(0.0, 1.0),
            reasoning,
            timestamp: Utc::now(),
            supporting_data: None,
        }
    }

    pub fn with_supporting_data(mut self, data: Value) -> Self {
        self.supporting_data = Some(data);
        self
    }
}

/// Runtime execution context binding one task to its participants and
/// accumulated decisions. One session per task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationSession {
    pub id: Uuid,

    pub task_id: Uuid,

    /// Snapshot of the task's assigned agents at session creation;
    /// later deregistration does not alter it
    pub participants: Vec<String>,

    pub start_time: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    pub status: SessionStatus,

    /// Append-only, ordered by insertion
    pub decisions: Vec<CollaborationDecision>,

    pub consensus_reached: bool,
}

impl CollaborationSession {
    pub fn new(task_id: Uuid, participants: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            participants,
            start_time: Utc::now(),
            end_time: None,
            status: SessionStatus::Active,
            decisions: Vec::new(),
            consensus_reached: false,
        }
    }

    /// Arithmetic mean of all recorded decision confidences, 0 if none.
    pub fn aggregate_confidence(&self) -> f64 {
        if self.decisions.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.decisions.iter().map(|d| d.confidence).sum();
        sum / self.decisions.len() as f64
    }
}
