use agentcore::{Agent, AgentError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};

/// Returns its parameters unchanged under `echo`
pub struct EchoAgent {
    running: AtomicBool,
}

impl EchoAgent {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
        }
    }

    /// Toggle availability; a stopped agent fails requests dispatched to it
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

impl Default for EchoAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for EchoAgent {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes parameters back for connectivity checks"
    }

    fn functions(&self) -> Vec<String> {
        vec!["echo".to_string(), "ping".to_string()]
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn execute(&self, function_name: &str, params: Value) -> Result<Value, AgentError> {
        match function_name {
            "echo" => {
                tracing::debug!("ECHO: {}", params);
                Ok(json!({ "echo": params }))
            }
            "ping" => Ok(json!({ "pong": true })),
            other => Err(AgentError::UnknownFunction(other.to_string())),
        }
    }
}
