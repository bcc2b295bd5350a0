//! Agent registry - descriptors, live instances, capability matching

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use collab_core::{AgentDescriptor, AgentInstance, CollabError, Result};

#[derive(Default)]
struct RegistryInner {
    descriptors: HashMap<String, AgentDescriptor>,
    /// Registration order; drives the deterministic tie-break in
    /// `find_suitable`. Re-registration keeps the original slot.
    order: Vec<String>,
    instances: HashMap<String, Arc<dyn AgentInstance>>,
}

/// Tracks known agents, their capabilities, priority, and status, plus
/// the live invocation handle per agent (a descriptor can exist without
/// a live instance; invoking such an agent fails closed).
#[derive(Clone, Default)]
pub struct AgentRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the descriptor keyed by agent id. Idempotent.
    pub async fn register(&self, descriptor: AgentDescriptor) {
        let mut inner = self.inner.write().await;
        let agent_id = descriptor.id.clone();
        if inner.descriptors.insert(agent_id.clone(), descriptor).is_none() {
            inner.order.push(agent_id.clone());
        }
        info!(agent_id = %agent_id, "agent registered");
    }

    /// Associate a live invocation handle with an agent id, independent
    /// of descriptor registration.
    pub async fn register_instance(&self, agent_id: &str, handle: Arc<dyn AgentInstance>) {
        self.inner
            .write()
            .await
            .instances
            .insert(agent_id.to_string(), handle);
        debug!(agent_id, "agent instance registered");
    }

    /// Explicitly remove an agent's descriptor and instance.
    pub async fn deregister(&self, agent_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        inner.instances.remove(agent_id);
        inner.order.retain(|id| id != agent_id);
        let removed = inner.descriptors.remove(agent_id).is_some();
        if removed {
            info!(agent_id, "agent deregistered");
        }
        removed
    }

    /// Remove just the live handle; the descriptor stays registered.
    pub async fn deregister_instance(&self, agent_id: &str) -> bool {
        self.inner.write().await.instances.remove(agent_id).is_some()
    }

    pub async fn get(&self, agent_id: &str) -> Option<AgentDescriptor> {
        self.inner.read().await.descriptors.get(agent_id).cloned()
    }

    pub async fn update_status(&self, agent_id: &str, status: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.descriptors.get_mut(agent_id) {
            Some(descriptor) => {
                descriptor.status = status.to_string();
                true
            }
            None => false,
        }
    }

    pub async fn get_status(&self, agent_id: &str) -> Option<String> {
        self.inner
            .read()
            .await
            .descriptors
            .get(agent_id)
            .map(|d| d.status.clone())
    }

    /// Ids of all active agents whose capability set intersects the
    /// required set, sorted by priority rank descending. The sort is
    /// stable, so equal priorities resolve in registration order.
    pub async fn find_suitable(&self, required: &HashSet<String>) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut matched: Vec<&AgentDescriptor> = inner
            .order
            .iter()
            .filter_map(|id| inner.descriptors.get(id))
            .filter(|d| d.is_active() && d.matches_any(required))
            .collect();
        matched.sort_by(|a, b| b.priority.rank().cmp(&a.priority.rank()));
        matched.iter().map(|d| d.id.clone()).collect()
    }

    /// Invoke an agent's live instance. Fails closed with
    /// [`CollabError::AgentUnavailable`] when no handle is registered -
    /// the coordinator never fabricates agent output. Records invocation
    /// latency into the descriptor on success.
    pub async fn invoke(&self, agent_id: &str, action: &str, params: Value) -> Result<Value> {
        // Clone the handle so the lock is not held across the await.
        let handle = self
            .inner
            .read()
            .await
            .instances
            .get(agent_id)
            .cloned()
            .ok_or_else(|| CollabError::AgentUnavailable {
                agent_id: agent_id.to_string(),
            })?;

        let started = Instant::now();
        let output = handle
            .invoke(action, params)
            .await
            .map_err(|source| CollabError::AgentInvocation {
                agent_id: agent_id.to_string(),
                source,
            })?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if let Some(descriptor) = self.inner.write().await.descriptors.get_mut(agent_id) {
            descriptor.response_time_ms = Some(elapsed_ms);
        }
        debug!(agent_id, action, elapsed_ms, "agent invocation completed");
        Ok(output)
    }
}
