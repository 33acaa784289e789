use agentcore::{RequestId, SubmitError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Capacity-limited FIFO of pending request ids
pub struct WorkQueue {
    items: Mutex<VecDeque<RequestId>>,
    capacity: AtomicUsize,
    notify: Notify,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity: AtomicUsize::new(capacity),
            notify: Notify::new(),
        }
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<RequestId>> {
        // Critical sections never panic while holding the lock; recover anyway.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::SeqCst)
    }

    /// New bound applies to the next `push`; ids already queued stay queued.
    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Enqueue without waiting; a full queue is a rejection.
    pub fn push(&self, id: RequestId) -> Result<(), SubmitError> {
        {
            let mut items = self.items();
            let capacity = self.capacity();
            if items.len() >= capacity {
                return Err(SubmitError::QueueFull { capacity });
            }
            items.push_back(id);
        }
        self.notify.notify_one();
        Ok(())
    }

    pub fn try_pop(&self) -> Option<RequestId> {
        self.items().pop_front()
    }

    /// Wait for the next id. `None` means the caller was told to stop.
    pub async fn pop(&self, stop: &CancellationToken) -> Option<RequestId> {
        loop {
            if stop.is_cancelled() {
                return None;
            }

            let notified = self.notify.notified();
            if let Some(id) = self.try_pop() {
                // Pass the wakeup on if more work is waiting.
                if !self.is_empty() {
                    self.notify.notify_one();
                }
                return Some(id);
            }

            tokio::select! {
                _ = notified => {}
                _ = stop.cancelled() => return None,
            }
        }
    }

    /// Drop a queued id (used when a pending request is cancelled)
    pub fn remove(&self, id: &RequestId) -> bool {
        let mut items = self.items();
        match items.iter().position(|queued| queued == id) {
            Some(pos) => {
                items.remove(pos);
                true
            }
            None => false,
        }
    }
}
