use serde::{Deserialize, Serialize};

/// Configuration for the workflow manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub max_workers: usize,
    pub max_queue_size: usize,
    /// Used when the function table has no timeout for a function
    pub default_timeout_ms: u64,
    /// How long `stop` waits for in-flight requests before abandoning them
    pub shutdown_grace_ms: u64,
    pub event_buffer_size: usize,
}

impl ManagerConfig {
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    pub fn with_shutdown_grace_ms(mut self, grace_ms: u64) -> Self {
        self.shutdown_grace_ms = grace_ms;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_queue_size: 100,
            default_timeout_ms: 30_000,
            shutdown_grace_ms: 5_000,
            event_buffer_size: 1000,
        }
    }
}
