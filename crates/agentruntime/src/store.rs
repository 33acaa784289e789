use agentcore::{RequestId, RequestRecord, RequestState};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

struct Entry {
    record: RequestRecord,
    /// Fired when the caller cancels, so the worker can drop the in-flight call
    cancel: CancellationToken,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<RequestId, Entry>,
    /// Submission order, oldest first
    order: VecDeque<RequestId>,
}

/// Single source of truth for request lifecycle state.
///
/// Every transition goes through one of the methods below under the write
/// lock, and each returns the updated snapshot only if it actually applied.
/// Callers use that to count each terminal transition exactly once.
#[derive(Default)]
pub struct RequestStore {
    inner: RwLock<Inner>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: RequestRecord) -> RequestId {
        let id = record.id;
        let mut inner = self.inner.write().await;
        inner.order.push_back(id);
        inner.entries.insert(
            id,
            Entry {
                record,
                cancel: CancellationToken::new(),
            },
        );
        id
    }

    /// Insert only if `admit` accepts the id. Both run under the write lock,
    /// so a rejected record is never observable and a worker that pops the
    /// id always finds it.
    pub async fn insert_if<E>(
        &self,
        record: RequestRecord,
        admit: impl FnOnce(RequestId) -> Result<(), E>,
    ) -> Result<RequestId, E> {
        let id = record.id;
        let mut inner = self.inner.write().await;
        admit(id)?;
        inner.order.push_back(id);
        inner.entries.insert(
            id,
            Entry {
                record,
                cancel: CancellationToken::new(),
            },
        );
        Ok(id)
    }

    pub async fn get(&self, id: &RequestId) -> Option<RequestRecord> {
        let inner = self.inner.read().await;
        inner.entries.get(id).map(|e| e.record.clone())
    }

    /// `PENDING -> RUNNING`; hands back the snapshot and the cancellation token
    pub async fn begin(&self, id: &RequestId) -> Option<(RequestRecord, CancellationToken)> {
        let mut inner = self.inner.write().await;
        let entry = inner.entries.get_mut(id)?;
        if !entry.record.mark_running() {
            return None;
        }
        Some((entry.record.clone(), entry.cancel.clone()))
    }

    pub async fn complete(&self, id: &RequestId, result: Value) -> Option<RequestRecord> {
        let mut inner = self.inner.write().await;
        let entry = inner.entries.get_mut(id)?;
        if !entry.record.complete(result) {
            return None;
        }
        Some(entry.record.clone())
    }

    pub async fn finish_with_error(
        &self,
        id: &RequestId,
        state: RequestState,
        error: impl Into<String>,
    ) -> Option<RequestRecord> {
        let mut inner = self.inner.write().await;
        let entry = inner.entries.get_mut(id)?;
        if !entry.record.finish_with_error(state, error) {
            return None;
        }
        Some(entry.record.clone())
    }

    /// Mark an active record `CANCELLED` and fire its token
    pub async fn cancel(&self, id: &RequestId, reason: &str) -> Option<RequestRecord> {
        let mut inner = self.inner.write().await;
        let entry = inner.entries.get_mut(id)?;
        if !entry
            .record
            .finish_with_error(RequestState::Cancelled, reason)
        {
            return None;
        }
        entry.cancel.cancel();
        Some(entry.record.clone())
    }

    /// Fail every record still `RUNNING`; returns the records that changed
    pub async fn fail_running(&self, reason: &str) -> Vec<RequestRecord> {
        let mut inner = self.inner.write().await;
        inner
            .entries
            .values_mut()
            .filter(|e| e.record.state == RequestState::Running)
            .filter_map(|e| {
                e.cancel.cancel();
                e.record
                    .finish_with_error(RequestState::Failed, reason)
                    .then(|| e.record.clone())
            })
            .collect()
    }

    /// Newest first
    pub async fn recent(&self, limit: usize) -> Vec<RequestRecord> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.entries.get(id))
            .take(limit)
            .map(|e| e.record.clone())
            .collect()
    }

    /// Evict the oldest terminal records beyond `keep_count`. Active records
    /// are never touched.
    pub async fn cleanup_terminal(&self, keep_count: usize) -> usize {
        let mut inner = self.inner.write().await;
        let terminal: Vec<RequestId> = inner
            .order
            .iter()
            .filter(|id| {
                inner
                    .entries
                    .get(*id)
                    .map(|e| e.record.state.is_terminal())
                    .unwrap_or(false)
            })
            .copied()
            .collect();

        if terminal.len() <= keep_count {
            return 0;
        }

        let evict: HashSet<RequestId> = terminal[..terminal.len() - keep_count]
            .iter()
            .copied()
            .collect();
        for id in &evict {
            inner.entries.remove(id);
        }
        inner.order.retain(|id| !evict.contains(id));
        evict.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    pub async fn count_in_state(&self, state: RequestState) -> usize {
        let inner = self.inner.read().await;
        inner
            .entries
            .values()
            .filter(|e| e.record.state == state)
            .count()
    }
}
