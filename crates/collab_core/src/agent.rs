//! Agent invocation contract

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AgentInvokeError;

/// Live invocation handle for one agent.
///
/// The coordinator treats the returned value as an opaque structured
/// payload it copies verbatim into stage output; agent-internal semantics
/// are never interpreted beyond boundary validation of `confidence`,
/// `reasoning`, and `decision` fields. `invoke` is the only suspension
/// point in the collaboration pipeline.
#[async_trait]
pub trait AgentInstance: Send + Sync {
    async fn invoke(&self, action: &str, params: Value) -> Result<Value, AgentInvokeError>;
}
