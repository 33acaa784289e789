use agentcore::{Agent, AgentError};
use async_trait::async_trait;
use serde_json::{json, Value};

/// JSON parse/stringify helpers
pub struct TransformAgent;

impl TransformAgent {
    fn json_parse(params: &Value) -> Result<Value, AgentError> {
        let input = params
            .get("json")
            .ok_or_else(|| AgentError::InvalidParameters("missing 'json'".to_string()))?
            .as_str()
            .ok_or_else(|| AgentError::InvalidParameters("'json' must be a string".to_string()))?;

        let parsed: Value = serde_json::from_str(input)
            .map_err(|e| AgentError::ExecutionFailed(format!("JSON parse error: {}", e)))?;

        Ok(json!({ "parsed": parsed }))
    }

    fn json_stringify(params: &Value) -> Result<Value, AgentError> {
        let value = params
            .get("value")
            .ok_or_else(|| AgentError::InvalidParameters("missing 'value'".to_string()))?;

        let json_str = serde_json::to_string_pretty(value)
            .map_err(|e| AgentError::ExecutionFailed(format!("JSON stringify error: {}", e)))?;

        Ok(json!({ "json": json_str }))
    }
}

#[async_trait]
impl Agent for TransformAgent {
    fn name(&self) -> &str {
        "transform"
    }

    fn description(&self) -> &str {
        "Parse JSON strings and stringify values"
    }

    fn functions(&self) -> Vec<String> {
        vec!["json_parse".to_string(), "json_stringify".to_string()]
    }

    async fn execute(&self, function_name: &str, params: Value) -> Result<Value, AgentError> {
        match function_name {
            "json_parse" => Self::json_parse(&params),
            "json_stringify" => Self::json_stringify(&params),
            other => Err(AgentError::UnknownFunction(other.to_string())),
        }
    }
}
