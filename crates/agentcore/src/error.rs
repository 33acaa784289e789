use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Submission rejected: {0}")]
    Submit(#[from] SubmitError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Raised synchronously by `submit_request*`; the request never gets an id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Missing required parameter '{parameter}' for function '{function}' on agent '{agent_id}'")]
    MissingParameter {
        agent_id: String,
        function: String,
        parameter: String,
    },

    #[error("Request queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
}

/// Application-level failure reported by an agent call.
#[derive(Error, Debug, Clone)]
pub enum AgentError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}
