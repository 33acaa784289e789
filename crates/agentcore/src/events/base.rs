use crate::{RequestId, RequestState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted as requests move through their lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RequestEvent {
    Submitted {
        request_id: RequestId,
        agent_id: String,
        function_name: String,
        timestamp: DateTime<Utc>,
    },
    Started {
        request_id: RequestId,
        worker: usize,
        timestamp: DateTime<Utc>,
    },
    Finished {
        request_id: RequestId,
        state: RequestState,
        error: Option<String>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl RequestEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            RequestEvent::Submitted { request_id, .. }
            | RequestEvent::Started { request_id, .. }
            | RequestEvent::Finished { request_id, .. } => *request_id,
        }
    }
}

/// Process-local fan-out of request events
pub struct EventBus {
    sender: broadcast::Sender<RequestEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RequestEvent> {
        self.sender.subscribe()
    }

    /// Fire and forget; having no subscribers is fine
    pub fn emit(&self, event: RequestEvent) {
        let _ = self.sender.send(event);
    }
}
