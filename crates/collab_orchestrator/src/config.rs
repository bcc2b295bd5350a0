//! Coordinator configuration

use serde::{Deserialize, Serialize};

/// Tunables of the collaboration coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Upper bound for a single agent invocation. Real agent calls can
    /// hang; exceeding this surfaces as an invocation failure for the
    /// owning session.
    #[serde(default = "default_invoke_timeout_ms")]
    pub invoke_timeout_ms: u64,

    /// How many deduplicated reasoning entries are appended to the base
    /// recommendations of a completed task.
    #[serde(default = "default_max_extra_recommendations")]
    pub max_extra_recommendations: usize,

    /// Generic recommendations every completed result starts with.
    #[serde(default = "default_base_recommendations")]
    pub base_recommendations: Vec<String>,
}

fn default_invoke_timeout_ms() -> u64 {
    30_000
}

fn default_max_extra_recommendations() -> usize {
    3
}

fn default_base_recommendations() -> Vec<String> {
    [
        "Keep a regular sleep schedule",
        "Stay hydrated and eat balanced meals",
        "Schedule a follow-up review of this plan",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            invoke_timeout_ms: default_invoke_timeout_ms(),
            max_extra_recommendations: default_max_extra_recommendations(),
            base_recommendations: default_base_recommendations(),
        }
    }
}
