use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use uuid::Uuid;

pub type RequestId = Uuid;

/// Lifecycle state of a submitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RequestState::Pending | RequestState::Running)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestState::Pending => "PENDING",
            RequestState::Running => "RUNNING",
            RequestState::Completed => "COMPLETED",
            RequestState::Failed => "FAILED",
            RequestState::Timeout => "TIMEOUT",
            RequestState::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Full lifecycle state of one submitted invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: RequestId,
    pub agent_id: String,
    pub function_name: String,
    pub parameters: Value,
    pub timeout_ms: u64,
    pub state: RequestState,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RequestRecord {
    pub fn new(
        agent_id: impl Into<String>,
        function_name: impl Into<String>,
        parameters: Value,
        timeout_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            function_name: function_name.into(),
            parameters,
            timeout_ms,
            state: RequestState::Pending,
            result: None,
            error: None,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// `PENDING -> RUNNING`. Returns false if the record was not pending.
    pub fn mark_running(&mut self) -> bool {
        if self.state != RequestState::Pending {
            return false;
        }
        self.state = RequestState::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// `PENDING|RUNNING -> COMPLETED`.
    pub fn complete(&mut self, result: Value) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = RequestState::Completed;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
        true
    }

    /// Move an active record into a non-success terminal state.
    ///
    /// An empty message is replaced by the state name so terminal failures
    /// always carry displayable text.
    pub fn finish_with_error(&mut self, state: RequestState, error: impl Into<String>) -> bool {
        debug_assert!(state.is_terminal() && state != RequestState::Completed);
        if self.state.is_terminal() {
            return false;
        }
        let mut error = error.into();
        if error.is_empty() {
            error = state.to_string();
        }
        self.state = state;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
        true
    }

    /// Milliseconds between dispatch and the terminal transition, if both happened
    pub fn execution_ms(&self) -> Option<u64> {
        let started = self.started_at?;
        let finished = self.finished_at?;
        Some((finished - started).num_milliseconds().max(0) as u64)
    }

    /// Result document consumed by the CLI/HTTP layer
    pub fn to_document(&self) -> Value {
        let mut doc = json!({
            "request_id": self.id,
            "state": self.state,
            "agent_id": self.agent_id,
            "function_name": self.function_name,
            "timeout_ms": self.timeout_ms,
        });
        if let Some(result) = &self.result {
            doc["result"] = result.clone();
        }
        if let Some(error) = &self.error {
            doc["error"] = Value::String(error.clone());
        }
        doc
    }
}
