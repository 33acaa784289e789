// crates/agentruntime/tests/manager_test.rs

use agentcore::{
    Agent, AgentError, EngineError, FunctionConfigDocument, RequestEvent, RequestState, SubmitError,
};
use agentruntime::{AgentManager, ManagerConfig, WorkflowManager};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(5);

/// Test agent with echo, sleep, block, fail and chat functions
struct ScriptedAgent {
    name: String,
    running: AtomicBool,
}

impl ScriptedAgent {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            running: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn execute(&self, function_name: &str, params: Value) -> Result<Value, AgentError> {
        match function_name {
            "echo" => Ok(json!({ "echo": params })),
            "sleep" => {
                let delay_ms = params.get("delay_ms").and_then(|v| v.as_u64()).unwrap_or(1000);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(json!({ "slept_ms": delay_ms }))
            }
            "block" => {
                let delay_ms = params.get("delay_ms").and_then(|v| v.as_u64()).unwrap_or(1000);
                std::thread::sleep(Duration::from_millis(delay_ms));
                Ok(json!({ "blocked_ms": delay_ms }))
            }
            "fail" => Err(AgentError::ExecutionFailed("model backend unavailable".to_string())),
            "chat" => Ok(json!({ "reply": params["message"] })),
            other => Err(AgentError::UnknownFunction(other.to_string())),
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

fn registry_with(agents: Vec<Arc<dyn Agent>>) -> Arc<AgentManager> {
    let mut registry = AgentManager::new();
    for agent in agents {
        registry.register(agent);
    }
    Arc::new(registry)
}

fn create_manager(config: ManagerConfig) -> WorkflowManager {
    init_tracing();
    let registry = registry_with(vec![Arc::new(ScriptedAgent::new("assistant"))]);
    WorkflowManager::with_config(registry, config)
}

async fn started_manager() -> WorkflowManager {
    let manager = create_manager(ManagerConfig::default().with_max_workers(2));
    manager.start().await;
    manager
}

async fn wait_for_state(manager: &WorkflowManager, id: &Uuid, state: RequestState) {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let record = manager.get_request_status(id).await.unwrap();
        if record.state == state {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "request never reached {}, still {}",
            state,
            record.state
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_echo_round_trip() {
    let manager = started_manager().await;

    let id = manager
        .submit_request("assistant", "echo", json!({"data": "x"}))
        .await
        .unwrap();

    let record = manager.wait_for_completion(&id, WAIT).await.unwrap();
    assert_eq!(record.state, RequestState::Completed);
    assert_eq!(record.result.as_ref().unwrap()["echo"]["data"], "x");
    assert!(record.error.is_none());
    assert!(record.started_at.is_some());
    assert!(record.finished_at.is_some());

    let doc = manager.get_request_result(&id).await;
    assert_eq!(doc["request_id"], id.to_string());
    assert_eq!(doc["state"], "COMPLETED");
    assert_eq!(doc["result"]["echo"]["data"], "x");
    assert_eq!(doc["agent_id"], "assistant");
    assert_eq!(doc["function_name"], "echo");
    assert_eq!(doc["timeout_ms"], 30_000);

    manager.stop().await;
}

#[tokio::test]
async fn test_ids_unique_and_immediately_resolvable() {
    let manager = create_manager(ManagerConfig::default());

    let mut ids = HashSet::new();
    for i in 0..20 {
        let id = manager
            .submit_request("assistant", "echo", json!({ "i": i }))
            .await
            .unwrap();
        let record = manager.get_request_status(&id).await.unwrap();
        assert_eq!(record.state, RequestState::Pending);
        assert!(ids.insert(id));
    }
}

#[tokio::test]
async fn test_agent_resolves_by_id_or_name() {
    init_tracing();
    let mut registry = AgentManager::new();
    let agent_id = registry.register(Arc::new(ScriptedAgent::new("assistant")));
    let manager = WorkflowManager::new(Arc::new(registry));
    manager.start().await;

    let id = manager
        .submit_request(&agent_id.to_string(), "echo", json!({}))
        .await
        .unwrap();
    let record = manager.wait_for_completion(&id, WAIT).await.unwrap();
    assert_eq!(record.state, RequestState::Completed);

    manager.stop().await;
}

#[tokio::test]
async fn test_queue_overflow_is_rejected() {
    // Workers never started, so nothing drains the queue.
    let manager = create_manager(ManagerConfig::default().with_max_queue_size(5));

    for _ in 0..5 {
        manager
            .submit_request("assistant", "echo", json!({}))
            .await
            .unwrap();
    }

    let err = manager
        .submit_request("assistant", "echo", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err, SubmitError::QueueFull { capacity: 5 });

    let stats = manager.get_statistics();
    assert_eq!(stats.total_requests, 5);
    assert_eq!(stats.rejected_requests, 1);
    assert_eq!(manager.list_recent_requests(100).await.len(), 5);

    // A larger bound applies immediately.
    manager.set_max_queue_size(6);
    assert!(manager
        .submit_request("assistant", "echo", json!({}))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_timeout_is_enforced() {
    let manager = started_manager().await;

    let id = manager
        .submit_request_with_timeout("assistant", "sleep", json!({"delay_ms": 2000}), 1)
        .await
        .unwrap();

    let record = manager.wait_for_completion(&id, WAIT).await.unwrap();
    assert_eq!(record.state, RequestState::Timeout);
    assert_eq!(record.timeout_ms, 1);
    assert!(record.result.is_none());
    assert!(!record.error.unwrap().is_empty());

    let stats = manager.get_statistics();
    assert_eq!(stats.timeout_requests, 1);
    assert_eq!(stats.failed_requests, 1);

    manager.stop().await;
}

#[tokio::test]
async fn test_function_config_timeout_and_validation() {
    let manager = started_manager().await;
    let document: FunctionConfigDocument = serde_json::from_value(json!({
        "functions": {
            "sleep": { "description": "Sleep", "timeout_ms": 20, "parameters": [] },
            "chat": {
                "description": "Chat",
                "timeout_ms": 60000,
                "parameters": [{ "name": "message", "type": "string", "required": true }]
            }
        }
    }))
    .unwrap();
    manager.load_function_configs(document).await;

    let err = manager
        .submit_request("assistant", "chat", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::MissingParameter { ref parameter, .. } if parameter == "message"));

    let chat = manager
        .submit_request("assistant", "chat", json!({"message": "hello"}))
        .await
        .unwrap();
    assert_eq!(manager.get_request_status(&chat).await.unwrap().timeout_ms, 60000);

    let sleep = manager
        .submit_request("assistant", "sleep", json!({"delay_ms": 1000}))
        .await
        .unwrap();
    let record = manager.wait_for_completion(&sleep, WAIT).await.unwrap();
    assert_eq!(record.timeout_ms, 20);
    assert_eq!(record.state, RequestState::Timeout);

    manager.stop().await;
}

#[tokio::test]
async fn test_load_function_configs_from_yaml_file() {
    use std::io::Write;

    let manager = create_manager(ManagerConfig::default());
    let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
    writeln!(
        file,
        "functions:\n  chat:\n    description: Chat\n    timeout_ms: 1500\n    parameters:\n      - name: message\n        type: string\n        required: true"
    )
    .unwrap();

    let count = manager.load_function_configs_from_path(file.path()).await.unwrap();
    assert_eq!(count, 1);
    assert_eq!(manager.function_names().await, vec!["chat"]);

    let id = manager
        .submit_request("assistant", "chat", json!({"message": "hi"}))
        .await
        .unwrap();
    assert_eq!(manager.get_request_status(&id).await.unwrap().timeout_ms, 1500);

    let missing = manager
        .load_function_configs_from_path("does-not-exist.json")
        .await
        .unwrap_err();
    assert!(matches!(missing, EngineError::Config(_)));
}

#[tokio::test]
async fn test_unknown_agent_is_rejected() {
    let manager = started_manager().await;

    let err = manager
        .submit_request("nobody", "echo", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err, SubmitError::UnknownAgent("nobody".to_string()));
    assert_eq!(manager.get_statistics().total_requests, 0);

    manager.stop().await;
}

#[tokio::test]
async fn test_agent_not_running_fails_request() {
    init_tracing();
    let agent = Arc::new(ScriptedAgent::new("assistant"));
    let manager = WorkflowManager::new(registry_with(vec![agent.clone()]));

    let id = manager
        .submit_request("assistant", "echo", json!({}))
        .await
        .unwrap();
    agent.running.store(false, Ordering::SeqCst);
    manager.start().await;

    let record = manager.wait_for_completion(&id, WAIT).await.unwrap();
    assert_eq!(record.state, RequestState::Failed);
    assert!(record.error.unwrap().contains("not running"));

    manager.stop().await;
}

#[tokio::test]
async fn test_agent_error_does_not_halt_pool() {
    let manager = started_manager().await;

    let failing = manager
        .submit_request("assistant", "fail", json!({}))
        .await
        .unwrap();
    let echo = manager
        .submit_request("assistant", "echo", json!({"after": "failure"}))
        .await
        .unwrap();

    let failed = manager.wait_for_completion(&failing, WAIT).await.unwrap();
    assert_eq!(failed.state, RequestState::Failed);
    assert!(failed.error.unwrap().contains("model backend unavailable"));

    let completed = manager.wait_for_completion(&echo, WAIT).await.unwrap();
    assert_eq!(completed.state, RequestState::Completed);

    let doc = manager.get_request_result(&failing).await;
    assert_eq!(doc["state"], "FAILED");
    assert!(doc.get("result").is_none());

    manager.stop().await;
}

#[tokio::test]
async fn test_cancel_completed_returns_false() {
    let manager = started_manager().await;

    let id = manager
        .submit_request("assistant", "echo", json!({"data": "x"}))
        .await
        .unwrap();
    let before = manager.wait_for_completion(&id, WAIT).await.unwrap();
    assert_eq!(before.state, RequestState::Completed);

    assert!(!manager.cancel_request(&id).await);

    let after = manager.get_request_status(&id).await.unwrap();
    assert_eq!(after.state, RequestState::Completed);
    assert_eq!(after.result, before.result);
    assert_eq!(after.finished_at, before.finished_at);
    assert!(after.error.is_none());

    manager.stop().await;
}

#[tokio::test]
async fn test_cancel_pending_request() {
    let manager = create_manager(ManagerConfig::default());

    let id = manager
        .submit_request("assistant", "echo", json!({}))
        .await
        .unwrap();
    assert!(manager.cancel_request(&id).await);
    assert!(!manager.cancel_request(&id).await);

    manager.start().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let record = manager.get_request_status(&id).await.unwrap();
    assert_eq!(record.state, RequestState::Cancelled);
    assert_eq!(record.error.as_deref(), Some("Request cancelled by caller"));
    assert!(record.started_at.is_none());
    assert_eq!(manager.get_statistics().cancelled_requests, 1);

    manager.stop().await;
}

#[tokio::test]
async fn test_cancel_running_request() {
    let manager = started_manager().await;

    let id = manager
        .submit_request_with_timeout("assistant", "sleep", json!({"delay_ms": 3000}), 10_000)
        .await
        .unwrap();
    wait_for_state(&manager, &id, RequestState::Running).await;

    assert!(manager.cancel_request(&id).await);

    // The abandoned call must never overwrite the cancelled record.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let record = manager.get_request_status(&id).await.unwrap();
    assert_eq!(record.state, RequestState::Cancelled);
    assert!(record.result.is_none());

    // The worker is free again.
    let echo = manager
        .submit_request("assistant", "echo", json!({}))
        .await
        .unwrap();
    let done = manager.wait_for_completion(&echo, WAIT).await.unwrap();
    assert_eq!(done.state, RequestState::Completed);

    let stats = manager.get_statistics();
    assert_eq!(stats.cancelled_requests, 1);
    assert_eq!(stats.completed_requests, 1);

    manager.stop().await;
}

#[tokio::test]
async fn test_unknown_ids_never_error() {
    let manager = create_manager(ManagerConfig::default());
    let id = Uuid::new_v4();

    assert!(manager.get_request_status(&id).await.is_none());
    assert!(!manager.cancel_request(&id).await);

    let doc = manager.get_request_result(&id).await;
    assert_eq!(doc["request_id"], id.to_string());
    assert_eq!(doc["state"], "UNKNOWN");
    assert!(doc["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_cleanup_keeps_most_recent_terminal_records() {
    let manager = started_manager().await;

    let mut ids = Vec::new();
    for i in 0..20 {
        let id = manager
            .submit_request("assistant", "echo", json!({ "i": i }))
            .await
            .unwrap();
        ids.push(id);
    }
    for id in &ids {
        let record = manager.wait_for_completion(id, WAIT).await.unwrap();
        assert!(record.state.is_terminal());
    }

    // One still-active record that cleanup must leave alone.
    manager.stop().await;
    let pending = manager
        .submit_request("assistant", "echo", json!({}))
        .await
        .unwrap();

    assert_eq!(manager.cleanup_completed_requests(10).await, 10);

    let remaining = manager.list_recent_requests(100).await;
    assert_eq!(remaining.len(), 11);
    assert_eq!(remaining[0].id, pending);
    for id in &ids[..10] {
        assert!(manager.get_request_status(id).await.is_none());
    }
    for id in &ids[10..] {
        assert!(manager.get_request_status(id).await.is_some());
    }
}

#[tokio::test]
async fn test_list_recent_newest_first() {
    let manager = create_manager(ManagerConfig::default());

    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(
            manager
                .submit_request("assistant", "echo", json!({ "i": i }))
                .await
                .unwrap(),
        );
    }

    let recent = manager.list_recent_requests(3).await;
    let recent_ids: Vec<_> = recent.iter().map(|r| r.id).collect();
    assert_eq!(recent_ids, vec![ids[4], ids[3], ids[2]]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions() {
    const CALLERS: usize = 5;
    const PER_CALLER: usize = 10;

    let manager = Arc::new(create_manager(ManagerConfig::default().with_max_workers(4)));
    manager.start().await;

    let mut tasks = Vec::new();
    for caller in 0..CALLERS {
        let manager = manager.clone();
        tasks.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            for i in 0..PER_CALLER {
                let id = manager
                    .submit_request("assistant", "echo", json!({ "caller": caller, "i": i }))
                    .await
                    .unwrap();
                ids.push(id);
            }
            ids
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        for id in task.await.unwrap() {
            assert!(ids.insert(id));
        }
    }
    assert_eq!(ids.len(), CALLERS * PER_CALLER);

    for id in &ids {
        let record = manager.wait_for_completion(id, WAIT).await.unwrap();
        assert_eq!(record.state, RequestState::Completed);
    }

    let stats = manager.get_statistics();
    assert_eq!(stats.total_requests, (CALLERS * PER_CALLER) as u64);
    assert_eq!(stats.completed_requests, (CALLERS * PER_CALLER) as u64);
    assert_eq!(stats.active_requests, 0);

    manager.stop().await;
}

#[tokio::test]
async fn test_start_stop_idempotent() {
    let manager = create_manager(ManagerConfig::default().with_max_workers(3));

    manager.stop().await;
    assert!(!manager.is_running());

    manager.start().await;
    manager.start().await;
    let status = manager.get_system_status().await;
    assert_eq!(status["running"], true);
    assert_eq!(status["worker_threads"], 3);
    assert_eq!(status["max_workers"], 3);
    assert_eq!(status["max_queue_size"], 100);
    assert_eq!(status["statistics"]["total_requests"], 0);

    manager.stop().await;
    manager.stop().await;
    let status = manager.get_system_status().await;
    assert_eq!(status["running"], false);
    assert_eq!(status["worker_threads"], 0);
}

#[tokio::test]
async fn test_stop_fails_requests_still_running() {
    let manager = create_manager(
        ManagerConfig::default()
            .with_max_workers(1)
            .with_shutdown_grace_ms(50),
    );
    manager.start().await;

    let id = manager
        .submit_request_with_timeout("assistant", "sleep", json!({"delay_ms": 3000}), 10_000)
        .await
        .unwrap();
    wait_for_state(&manager, &id, RequestState::Running).await;

    manager.stop().await;

    let record = manager.get_request_status(&id).await.unwrap();
    assert_eq!(record.state, RequestState::Failed);
    assert!(record.error.unwrap().contains("stopped"));
    assert_eq!(manager.get_statistics().active_requests, 0);
}

#[tokio::test]
async fn test_start_during_stop_keeps_new_requests() {
    let manager = Arc::new(create_manager(
        ManagerConfig::default()
            .with_max_workers(1)
            .with_shutdown_grace_ms(300),
    ));
    manager.start().await;

    let stuck = manager
        .submit_request_with_timeout("assistant", "sleep", json!({"delay_ms": 3000}), 10_000)
        .await
        .unwrap();
    wait_for_state(&manager, &stuck, RequestState::Running).await;

    let stopping = tokio::spawn({
        let manager = manager.clone();
        async move { manager.stop().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.start().await;
    stopping.await.unwrap();
    assert!(manager.is_running());

    let stuck = manager.get_request_status(&stuck).await.unwrap();
    assert_eq!(stuck.state, RequestState::Failed);

    let fresh = manager
        .submit_request("assistant", "sleep", json!({"delay_ms": 100}))
        .await
        .unwrap();
    let record = manager.wait_for_completion(&fresh, WAIT).await.unwrap();
    assert_eq!(record.state, RequestState::Completed);
    assert!(record.error.is_none());

    manager.stop().await;
}

#[tokio::test]
async fn test_blocking_agent_still_times_out() {
    let manager = started_manager().await;
    let started = std::time::Instant::now();

    let slow = manager
        .submit_request_with_timeout("assistant", "block", json!({"delay_ms": 400}), 1)
        .await
        .unwrap();
    let fast = manager
        .submit_request("assistant", "echo", json!({"data": "y"}))
        .await
        .unwrap();

    let fast = manager.wait_for_completion(&fast, WAIT).await.unwrap();
    assert_eq!(fast.state, RequestState::Completed);

    let slow = manager.wait_for_completion(&slow, WAIT).await.unwrap();
    assert_eq!(slow.state, RequestState::Timeout);
    assert!(started.elapsed() < Duration::from_millis(300));

    manager.stop().await;
}

#[tokio::test]
async fn test_queued_requests_survive_restart() {
    let manager = create_manager(ManagerConfig::default());

    let id = manager
        .submit_request("assistant", "echo", json!({"queued": true}))
        .await
        .unwrap();
    manager.start().await;
    manager.stop().await;
    manager.start().await;

    let record = manager.wait_for_completion(&id, WAIT).await.unwrap();
    assert_eq!(record.state, RequestState::Completed);

    manager.stop().await;
}

#[tokio::test]
async fn test_set_max_workers_resizes_running_pool() {
    let manager = create_manager(ManagerConfig::default().with_max_workers(1));
    manager.start().await;

    manager.set_max_workers(3).await;
    let status = manager.get_system_status().await;
    assert_eq!(status["max_workers"], 3);
    assert_eq!(status["worker_threads"], 3);

    // With three workers, three slow requests overlap.
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(
            manager
                .submit_request_with_timeout("assistant", "sleep", json!({"delay_ms": 300}), 5000)
                .await
                .unwrap(),
        );
    }
    for id in &ids {
        wait_for_state(&manager, id, RequestState::Running).await;
    }

    manager.set_max_workers(1).await;
    for id in &ids {
        let record = manager.wait_for_completion(id, WAIT).await.unwrap();
        assert_eq!(record.state, RequestState::Completed);
    }

    manager.stop().await;
}

#[tokio::test]
async fn test_lifecycle_events() {
    let manager = create_manager(ManagerConfig::default());
    let mut events = manager.subscribe_events();

    // Submit before starting so the event order is deterministic.
    let id = manager
        .submit_request("assistant", "echo", json!({}))
        .await
        .unwrap();
    manager.start().await;

    let mut seen = Vec::new();
    while seen.len() < 3 {
        let event = tokio::time::timeout(WAIT, events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.request_id(), id);
        seen.push(event);
    }

    assert!(matches!(seen[0], RequestEvent::Submitted { .. }));
    assert!(matches!(seen[1], RequestEvent::Started { .. }));
    assert!(matches!(
        seen[2],
        RequestEvent::Finished { state: RequestState::Completed, .. }
    ));

    manager.stop().await;
}
