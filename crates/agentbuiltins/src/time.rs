use agentcore::{Agent, AgentError};
use async_trait::async_trait;
use serde_json::Value;
use tokio::time::{sleep, Duration};

/// Sleeps for `delay_ms` and passes its parameters through
pub struct DelayAgent;

#[async_trait]
impl Agent for DelayAgent {
    fn name(&self) -> &str {
        "delay"
    }

    fn description(&self) -> &str {
        "Delay for the given milliseconds, then return the parameters"
    }

    fn functions(&self) -> Vec<String> {
        vec!["sleep".to_string()]
    }

    async fn execute(&self, function_name: &str, params: Value) -> Result<Value, AgentError> {
        if function_name != "sleep" {
            return Err(AgentError::UnknownFunction(function_name.to_string()));
        }

        let delay_ms = match params.get("delay_ms") {
            None => 1000, // Default to 1 second if not specified
            Some(v) => v.as_u64().ok_or_else(|| {
                AgentError::InvalidParameters(format!("delay_ms must be a non-negative integer, got {}", v))
            })?,
        };

        tracing::debug!("Delaying for {}ms", delay_ms);
        sleep(Duration::from_millis(delay_ms)).await;

        Ok(params)
    }
}
