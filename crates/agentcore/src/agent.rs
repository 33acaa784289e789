use crate::AgentError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

pub type AgentId = Uuid;

/// An executable capability unit exposing named functions
#[async_trait]
pub trait Agent: Send + Sync {
    /// Registry name (e.g., "echo", "delay")
    fn name(&self) -> &str;

    /// Human readable summary, shown by the CLI
    fn description(&self) -> &str {
        ""
    }

    /// Functions this agent understands
    fn functions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the agent currently accepts work
    fn is_running(&self) -> bool {
        true
    }

    /// Execute a named function with the given parameters.
    ///
    /// Each call is driven on its own blocking-pool thread, so implementations
    /// may be invoked concurrently and may block. A blocking section still
    /// runs to completion after a timeout or cancellation; only its output is
    /// discarded.
    async fn execute(&self, function_name: &str, params: Value) -> Result<Value, AgentError>;
}

/// Lookup from agent id or name to a callable agent
pub trait AgentRegistry: Send + Sync {
    fn resolve(&self, agent_id: &str) -> Option<Arc<dyn Agent>>;

    fn list_agents(&self) -> Vec<String>;
}
