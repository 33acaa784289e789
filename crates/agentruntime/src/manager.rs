use crate::worker::{Dispatcher, WorkerPool};
use crate::{ManagerConfig, RequestStore, Statistics, StatisticsSnapshot, WorkQueue};
use agentcore::{
    AgentRegistry, EventBus, FunctionConfigDocument, FunctionConfigTable, RequestEvent, RequestId,
    RequestRecord, RequestState, SubmitError,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::{Duration, Instant};

const CANCELLED_MESSAGE: &str = "Request cancelled by caller";
const STOPPED_MESSAGE: &str = "Workflow manager stopped before completion";

/// Accepts agent function requests and runs them on a bounded worker pool
pub struct WorkflowManager {
    dispatcher: Arc<Dispatcher>,
    functions: RwLock<FunctionConfigTable>,
    pool: Mutex<Option<WorkerPool>>,
    running: AtomicBool,
    max_workers: AtomicUsize,
    default_timeout_ms: AtomicU64,
    shutdown_grace: Duration,
}

impl WorkflowManager {
    /// Create a manager with default settings
    pub fn new(registry: Arc<dyn AgentRegistry>) -> Self {
        Self::with_config(registry, ManagerConfig::default())
    }

    /// Create a manager with custom configuration. Workers start on `start`.
    pub fn with_config(registry: Arc<dyn AgentRegistry>, config: ManagerConfig) -> Self {
        let dispatcher = Arc::new(Dispatcher {
            registry,
            store: RequestStore::new(),
            queue: WorkQueue::new(config.max_queue_size),
            stats: Statistics::new(),
            events: EventBus::new(config.event_buffer_size),
        });

        Self {
            dispatcher,
            functions: RwLock::new(FunctionConfigTable::new()),
            pool: Mutex::new(None),
            running: AtomicBool::new(false),
            max_workers: AtomicUsize::new(config.max_workers.max(1)),
            default_timeout_ms: AtomicU64::new(config.default_timeout_ms),
            shutdown_grace: Duration::from_millis(config.shutdown_grace_ms),
        }
    }

    /// Spin up the worker pool. No-op if already running.
    pub async fn start(&self) {
        let mut pool = self.pool.lock().await;
        if pool.is_some() {
            tracing::debug!("Workflow manager already running");
            return;
        }

        let workers = self.max_workers();
        *pool = Some(WorkerPool::start(&self.dispatcher, workers));
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Workflow manager started with {} workers", workers);
    }

    /// Stop the worker pool. Queued requests stay queued for the next
    /// `start`; requests still running after the grace period are failed.
    ///
    /// The pool lock is held until the sweep finishes, so a concurrent
    /// `start` waits and its new workers never see the sweep.
    pub async fn stop(&self) {
        let mut guard = self.pool.lock().await;
        let Some(pool) = guard.take() else {
            return;
        };
        self.running.store(false, Ordering::SeqCst);

        if !pool.shutdown(self.shutdown_grace).await {
            tracing::warn!(
                "Workers did not finish within {}ms, abandoning in-flight requests",
                self.shutdown_grace.as_millis()
            );
        }

        for record in self.dispatcher.store.fail_running(STOPPED_MESSAGE).await {
            self.dispatcher.record_finished(&record);
        }
        drop(guard);
        tracing::info!("Workflow manager stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Submit using the timeout configured for `function_name`
    pub async fn submit_request(
        &self,
        agent_id: &str,
        function_name: &str,
        params: Value,
    ) -> Result<RequestId, SubmitError> {
        let timeout_ms = self
            .functions
            .read()
            .await
            .resolve_timeout(function_name, self.default_timeout_ms());
        self.submit(agent_id, function_name, params, timeout_ms).await
    }

    /// Submit with a caller-chosen timeout
    pub async fn submit_request_with_timeout(
        &self,
        agent_id: &str,
        function_name: &str,
        params: Value,
        timeout_ms: u64,
    ) -> Result<RequestId, SubmitError> {
        self.submit(agent_id, function_name, params, timeout_ms).await
    }

    async fn submit(
        &self,
        agent_id: &str,
        function_name: &str,
        params: Value,
        timeout_ms: u64,
    ) -> Result<RequestId, SubmitError> {
        let result = self.enqueue(agent_id, function_name, params, timeout_ms).await;
        if let Err(e) = &result {
            self.dispatcher.stats.record_rejected();
            tracing::warn!("Rejected {}.{}: {}", agent_id, function_name, e);
        }
        result
    }

    async fn enqueue(
        &self,
        agent_id: &str,
        function_name: &str,
        params: Value,
        timeout_ms: u64,
    ) -> Result<RequestId, SubmitError> {
        if self.dispatcher.registry.resolve(agent_id).is_none() {
            return Err(SubmitError::UnknownAgent(agent_id.to_string()));
        }
        self.functions
            .read()
            .await
            .validate(agent_id, function_name, &params)?;

        let record = RequestRecord::new(agent_id, function_name, params, timeout_ms);
        let queue = &self.dispatcher.queue;
        let request_id = self
            .dispatcher
            .store
            .insert_if(record, |id| queue.push(id))
            .await?;

        self.dispatcher.stats.record_submitted();
        self.dispatcher.events.emit(RequestEvent::Submitted {
            request_id,
            agent_id: agent_id.to_string(),
            function_name: function_name.to_string(),
            timestamp: Utc::now(),
        });
        tracing::debug!(%request_id, "Queued {}.{} ({}ms)", agent_id, function_name, timeout_ms);

        Ok(request_id)
    }

    /// Snapshot of a request, or `None` if unknown
    pub async fn get_request_status(&self, request_id: &RequestId) -> Option<RequestRecord> {
        self.dispatcher.store.get(request_id).await
    }

    /// Result document; unknown ids yield an error document
    pub async fn get_request_result(&self, request_id: &RequestId) -> Value {
        match self.dispatcher.store.get(request_id).await {
            Some(record) => record.to_document(),
            None => json!({
                "request_id": request_id,
                "state": "UNKNOWN",
                "error": format!("Request not found: {}", request_id),
            }),
        }
    }

    /// Cancel a pending or running request.
    ///
    /// A running agent call is dropped at its next await point; work it does
    /// synchronously cannot be interrupted, and its output is discarded.
    pub async fn cancel_request(&self, request_id: &RequestId) -> bool {
        match self.dispatcher.store.cancel(request_id, CANCELLED_MESSAGE).await {
            Some(record) => {
                self.dispatcher.queue.remove(request_id);
                self.dispatcher.record_finished(&record);
                true
            }
            None => false,
        }
    }

    /// Most recently submitted first
    pub async fn list_recent_requests(&self, limit: usize) -> Vec<RequestRecord> {
        self.dispatcher.store.recent(limit).await
    }

    /// Keep only the newest `keep_count` terminal records; returns how many
    /// were evicted
    pub async fn cleanup_completed_requests(&self, keep_count: usize) -> usize {
        let evicted = self.dispatcher.store.cleanup_terminal(keep_count).await;
        if evicted > 0 {
            tracing::info!("Evicted {} finished requests", evicted);
        }
        evicted
    }

    /// Poll until the request is terminal or `max_wait` elapses, returning
    /// the latest snapshot
    pub async fn wait_for_completion(
        &self,
        request_id: &RequestId,
        max_wait: Duration,
    ) -> Option<RequestRecord> {
        let deadline = Instant::now() + max_wait;
        loop {
            let record = self.get_request_status(request_id).await?;
            if record.state.is_terminal() || Instant::now() >= deadline {
                return Some(record);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub fn get_statistics(&self) -> StatisticsSnapshot {
        self.dispatcher.stats.snapshot()
    }

    pub async fn get_system_status(&self) -> Value {
        let worker_threads = self
            .pool
            .lock()
            .await
            .as_ref()
            .map(|pool| pool.live_workers())
            .unwrap_or(0);

        json!({
            "running": self.is_running(),
            "worker_threads": worker_threads,
            "max_workers": self.max_workers(),
            "max_queue_size": self.dispatcher.queue.capacity(),
            "queue_size": self.dispatcher.queue.len(),
            "default_timeout_ms": self.default_timeout_ms(),
            "stored_requests": self.dispatcher.store.len().await,
            "running_requests": self.dispatcher.store.count_in_state(RequestState::Running).await,
            "agents": self.dispatcher.registry.list_agents(),
            "statistics": self.get_statistics(),
        })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers.load(Ordering::SeqCst)
    }

    /// Resize the pool; applies immediately when running
    pub async fn set_max_workers(&self, max_workers: usize) {
        let max_workers = max_workers.max(1);
        self.max_workers.store(max_workers, Ordering::SeqCst);

        if let Some(pool) = self.pool.lock().await.as_mut() {
            pool.resize(&self.dispatcher, max_workers);
            tracing::info!("Resized worker pool to {}", max_workers);
        }
    }

    pub fn max_queue_size(&self) -> usize {
        self.dispatcher.queue.capacity()
    }

    pub fn set_max_queue_size(&self, max_queue_size: usize) {
        self.dispatcher.queue.set_capacity(max_queue_size);
    }

    pub fn default_timeout_ms(&self) -> u64 {
        self.default_timeout_ms.load(Ordering::SeqCst)
    }

    pub fn set_default_timeout_ms(&self, timeout_ms: u64) {
        self.default_timeout_ms.store(timeout_ms, Ordering::SeqCst);
    }

    /// Replace the function configuration table
    pub async fn load_function_configs(&self, document: FunctionConfigDocument) {
        self.functions.write().await.load(document);
    }

    /// Load a JSON or YAML function configuration file, returning how many
    /// functions it defines
    pub async fn load_function_configs_from_path(&self, path: impl AsRef<Path>) -> agentcore::Result<usize> {
        let path = path.as_ref();
        let document = FunctionConfigDocument::from_path(path)?;
        let count = document.functions.len();
        tracing::info!("Using function configs from {}", path.display());
        self.load_function_configs(document).await;
        Ok(count)
    }

    pub async fn function_names(&self) -> Vec<String> {
        self.functions.read().await.function_names()
    }

    /// Subscribe to request lifecycle events
    pub fn subscribe_events(&self) -> broadcast::Receiver<RequestEvent> {
        self.dispatcher.events.subscribe()
    }
}

impl Drop for WorkflowManager {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.get_mut().take() {
            pool.cancel();
        }
    }
}
