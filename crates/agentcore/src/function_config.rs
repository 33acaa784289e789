use crate::{ConfigError, SubmitError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// On-disk shape: `{ functions: { <name>: { description, timeout_ms, parameters } } }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionConfigDocument {
    #[serde(default)]
    pub functions: HashMap<String, FunctionConfig>,
}

impl FunctionConfigDocument {
    /// Read a `.json`, `.yaml` or `.yml` file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => Ok(serde_json::from_str(&raw)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&raw)?),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Per-function settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionConfig {
    /// Informational only
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl FunctionConfig {
    pub fn required_parameters(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: String,
    #[serde(default)]
    pub required: bool,
}

/// Immutable-after-load lookup used for timeouts and presence checks
#[derive(Debug, Clone, Default)]
pub struct FunctionConfigTable {
    functions: HashMap<String, FunctionConfig>,
}

impl FunctionConfigTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(document: FunctionConfigDocument) -> Self {
        Self {
            functions: document.functions,
        }
    }

    /// Replace the whole table; entries are not merged.
    pub fn load(&mut self, document: FunctionConfigDocument) {
        tracing::info!("Loaded {} function configs", document.functions.len());
        self.functions = document.functions;
    }

    pub fn get(&self, function_name: &str) -> Option<&FunctionConfig> {
        self.functions.get(function_name)
    }

    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn resolve_timeout(&self, function_name: &str, default_ms: u64) -> u64 {
        self.functions
            .get(function_name)
            .and_then(|f| f.timeout_ms)
            .unwrap_or(default_ms)
    }

    /// Presence check of required parameters. Unknown functions pass; the
    /// agent itself may still reject them.
    pub fn validate(
        &self,
        agent_id: &str,
        function_name: &str,
        params: &Value,
    ) -> Result<(), SubmitError> {
        let Some(config) = self.functions.get(function_name) else {
            return Ok(());
        };

        for required in config.required_parameters() {
            let present = params
                .as_object()
                .map(|obj| obj.contains_key(required))
                .unwrap_or(false);
            if !present {
                return Err(SubmitError::MissingParameter {
                    agent_id: agent_id.to_string(),
                    function: function_name.to_string(),
                    parameter: required.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn chat_document() -> FunctionConfigDocument {
        serde_json::from_value(json!({
            "functions": {
                "chat": {
                    "description": "Chat with the model",
                    "timeout_ms": 60000,
                    "parameters": [
                        {"name": "message", "type": "string", "required": true},
                        {"name": "temperature", "type": "number", "required": false}
                    ]
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn resolves_configured_timeout_or_default() {
        let table = FunctionConfigTable::from_document(chat_document());
        assert_eq!(table.resolve_timeout("chat", 30000), 60000);
        assert_eq!(table.resolve_timeout("echo", 30000), 30000);
    }

    #[test]
    fn validation_checks_required_presence_only() {
        let table = FunctionConfigTable::from_document(chat_document());

        assert!(table.validate("llm", "chat", &json!({"message": "hi"})).is_ok());
        assert!(table.validate("llm", "unknown", &json!({})).is_ok());

        let err = table
            .validate("llm", "chat", &json!({"temperature": 0.2}))
            .unwrap_err();
        assert_eq!(
            err,
            SubmitError::MissingParameter {
                agent_id: "llm".to_string(),
                function: "chat".to_string(),
                parameter: "message".to_string(),
            }
        );
        assert!(table.validate("llm", "chat", &json!("not an object")).is_err());
    }

    #[test]
    fn load_replaces_instead_of_merging() {
        let mut table = FunctionConfigTable::from_document(chat_document());
        let mut replacement = FunctionConfigDocument::default();
        replacement
            .functions
            .insert("echo".to_string(), FunctionConfig::default());

        table.load(replacement);
        assert_eq!(table.function_names(), vec!["echo".to_string()]);
        assert!(table.get("chat").is_none());
    }

    #[test]
    fn reads_yaml_files() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "functions:\n  summarize:\n    timeout_ms: 1500\n    parameters:\n      - name: text\n        type: string\n        required: true\n"
        )
        .unwrap();

        let doc = FunctionConfigDocument::from_path(file.path()).unwrap();
        let table = FunctionConfigTable::from_document(doc);
        assert_eq!(table.resolve_timeout("summarize", 10), 1500);
        assert_eq!(
            table.get("summarize").unwrap().required_parameters().collect::<Vec<_>>(),
            vec!["text"]
        );
    }

    #[test]
    fn rejects_unknown_extensions() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = FunctionConfigDocument::from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
