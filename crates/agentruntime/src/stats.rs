use agentcore::RequestState;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide request counters. Updates are plain atomic increments.
#[derive(Debug, Default)]
pub struct Statistics {
    total_requests: AtomicU64,
    completed_requests: AtomicU64,
    failed_requests: AtomicU64,
    timeout_requests: AtomicU64,
    cancelled_requests: AtomicU64,
    rejected_requests: AtomicU64,
    timed_requests: AtomicU64,
    total_execution_ms: AtomicU64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Call exactly once per terminal transition.
    pub fn record_terminal(&self, state: RequestState, execution_ms: Option<u64>) {
        match state {
            RequestState::Completed => {
                self.completed_requests.fetch_add(1, Ordering::Relaxed);
            }
            RequestState::Failed => {
                self.failed_requests.fetch_add(1, Ordering::Relaxed);
            }
            RequestState::Timeout => {
                self.failed_requests.fetch_add(1, Ordering::Relaxed);
                self.timeout_requests.fetch_add(1, Ordering::Relaxed);
            }
            RequestState::Cancelled => {
                self.cancelled_requests.fetch_add(1, Ordering::Relaxed);
            }
            RequestState::Pending | RequestState::Running => return,
        }

        if let Some(ms) = execution_ms {
            self.timed_requests.fetch_add(1, Ordering::Relaxed);
            self.total_execution_ms.fetch_add(ms, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let timed = self.timed_requests.load(Ordering::Relaxed);
        let total_ms = self.total_execution_ms.load(Ordering::Relaxed);
        let total = self.total_requests.load(Ordering::Relaxed);
        let completed = self.completed_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let cancelled = self.cancelled_requests.load(Ordering::Relaxed);
        StatisticsSnapshot {
            total_requests: total,
            completed_requests: completed,
            failed_requests: failed,
            timeout_requests: self.timeout_requests.load(Ordering::Relaxed),
            cancelled_requests: cancelled,
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            // A worker may settle a request before its submission is counted.
            active_requests: total.saturating_sub(completed + failed + cancelled),
            total_execution_ms: total_ms,
            average_execution_ms: if timed == 0 {
                0.0
            } else {
                total_ms as f64 / timed as f64
            },
        }
    }
}

/// Read-only copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub total_requests: u64,
    pub completed_requests: u64,
    /// Includes timeouts
    pub failed_requests: u64,
    pub timeout_requests: u64,
    pub cancelled_requests: u64,
    pub rejected_requests: u64,
    /// Accepted but not yet terminal
    pub active_requests: u64,
    pub total_execution_ms: u64,
    pub average_execution_ms: f64,
}
