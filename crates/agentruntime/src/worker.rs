use crate::{RequestStore, Statistics, WorkQueue};
use agentcore::{AgentRegistry, EventBus, RequestEvent, RequestId, RequestRecord, RequestState};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

/// State shared by the manager and every worker
pub(crate) struct Dispatcher {
    pub(crate) registry: Arc<dyn AgentRegistry>,
    pub(crate) store: RequestStore,
    pub(crate) queue: WorkQueue,
    pub(crate) stats: Statistics,
    pub(crate) events: EventBus,
}

impl Dispatcher {
    /// Worker loop: pull ids until told to stop
    async fn run_worker(self: Arc<Self>, worker: usize, stop: CancellationToken) {
        tracing::debug!(worker, "Worker started");

        while let Some(request_id) = self.queue.pop(&stop).await {
            self.process(worker, request_id).await;
        }

        tracing::debug!(worker, "Worker stopped");
    }

    /// Run one request to a terminal state. Failures become record data.
    async fn process(&self, worker: usize, request_id: RequestId) {
        let Some((record, cancel)) = self.store.begin(&request_id).await else {
            tracing::debug!(%request_id, "Skipping request that is no longer pending");
            return;
        };

        self.events.emit(RequestEvent::Started {
            request_id,
            worker,
            timestamp: Utc::now(),
        });

        let agent = match self.registry.resolve(&record.agent_id) {
            Some(agent) if agent.is_running() => agent,
            Some(_) => {
                let error = format!("Agent {} is not running", record.agent_id);
                self.fail(&request_id, RequestState::Failed, error).await;
                return;
            }
            None => {
                let error = format!("Agent not found: {}", record.agent_id);
                self.fail(&request_id, RequestState::Failed, error).await;
                return;
            }
        };

        tracing::debug!(
            %request_id,
            worker,
            "Dispatching {}.{}",
            record.agent_id,
            record.function_name
        );

        // Driven on a blocking-pool thread so a blocking agent cannot stall
        // the workers or their deadlines. Firing `call_stop` drops the call
        // at its next await point.
        let function_name = record.function_name.clone();
        let params = record.parameters.clone();
        let call_stop = cancel.child_token();
        let call_token = call_stop.clone();
        let runtime = Handle::current();
        let call = tokio::task::spawn_blocking(move || {
            runtime.block_on(async move {
                tokio::select! {
                    result = agent.execute(&function_name, params) => Some(result),
                    _ = call_token.cancelled() => None,
                }
            })
        });

        match timeout(Duration::from_millis(record.timeout_ms), call).await {
            Ok(Ok(Some(Ok(value)))) => {
                let updated = self.store.complete(&request_id, value).await;
                self.settle(&request_id, updated);
            }
            Ok(Ok(Some(Err(e)))) => {
                self.fail(&request_id, RequestState::Failed, e.to_string()).await;
            }
            Ok(Ok(None)) => {
                tracing::debug!(%request_id, "Abandoned in-flight call for cancelled request");
            }
            Ok(Err(join_error)) => {
                let error = if join_error.is_panic() {
                    format!("Agent {} panicked during {}", record.agent_id, record.function_name)
                } else {
                    format!("Agent call aborted: {}", join_error)
                };
                self.fail(&request_id, RequestState::Failed, error).await;
            }
            Err(_) => {
                call_stop.cancel();
                let error = format!("Request timed out after {} ms", record.timeout_ms);
                self.fail(&request_id, RequestState::Timeout, error).await;
            }
        }
    }

    async fn fail(&self, request_id: &RequestId, state: RequestState, error: String) {
        let updated = self.store.finish_with_error(request_id, state, error).await;
        self.settle(request_id, updated);
    }

    /// Account for a transition attempt. `None` means the record was already
    /// terminal and the outcome is dropped.
    fn settle(&self, request_id: &RequestId, updated: Option<RequestRecord>) {
        match updated {
            Some(record) => self.record_finished(&record),
            None => {
                tracing::debug!(%request_id, "Discarding late result for finished request");
            }
        }
    }

    pub(crate) fn record_finished(&self, record: &RequestRecord) {
        let duration_ms = record.execution_ms();
        self.stats.record_terminal(record.state, duration_ms);

        match record.state {
            RequestState::Completed => {
                tracing::info!(request_id = %record.id, "Request completed in {}ms", duration_ms.unwrap_or(0));
            }
            RequestState::Cancelled => {
                tracing::info!(request_id = %record.id, "Request cancelled");
            }
            state => {
                tracing::warn!(
                    request_id = %record.id,
                    "Request {}: {}",
                    state,
                    record.error.as_deref().unwrap_or_default()
                );
            }
        }

        self.events.emit(RequestEvent::Finished {
            request_id: record.id,
            state: record.state,
            error: record.error.clone(),
            duration_ms: duration_ms.unwrap_or(0),
            timestamp: Utc::now(),
        });
    }
}

struct WorkerHandle {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

/// Fixed set of worker tasks sharing one dispatcher
pub(crate) struct WorkerPool {
    shutdown: CancellationToken,
    workers: Vec<WorkerHandle>,
    /// Workers told to exit by a shrink; joined on shutdown
    retired: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn start(dispatcher: &Arc<Dispatcher>, count: usize) -> Self {
        let mut pool = Self {
            shutdown: CancellationToken::new(),
            workers: Vec::new(),
            retired: Vec::new(),
        };
        pool.resize(dispatcher, count);
        pool
    }

    /// Grow by spawning, shrink by stopping the newest workers. A stopped
    /// worker finishes its current request before exiting.
    pub(crate) fn resize(&mut self, dispatcher: &Arc<Dispatcher>, count: usize) {
        self.retired.retain(|handle| !handle.is_finished());

        while self.workers.len() > count {
            if let Some(worker) = self.workers.pop() {
                worker.stop.cancel();
                self.retired.push(worker.handle);
            }
        }

        while self.workers.len() < count {
            let index = self.workers.len();
            let stop = self.shutdown.child_token();
            let handle = tokio::spawn(dispatcher.clone().run_worker(index, stop.clone()));
            self.workers.push(WorkerHandle { stop, handle });
        }
    }

    pub(crate) fn live_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| !w.handle.is_finished())
            .count()
    }

    /// Signal every worker without waiting
    pub(crate) fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Stop all workers, waiting up to `grace` for in-flight requests.
    /// Returns false if some workers had to be aborted.
    pub(crate) async fn shutdown(self, grace: Duration) -> bool {
        self.shutdown.cancel();

        let handles: Vec<JoinHandle<()>> = self
            .workers
            .into_iter()
            .map(|w| w.handle)
            .chain(self.retired)
            .collect();
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        match timeout(grace, join_all(handles)).await {
            Ok(_) => true,
            Err(_) => {
                for abort in aborts {
                    abort.abort();
                }
                false
            }
        }
    }
}
