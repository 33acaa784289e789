// crates/agentcli/src/main.rs

use agentcore::{FunctionConfigDocument, FunctionConfigTable, RequestEvent, RequestState};
use agentruntime::{AgentManager, ManagerConfig, WorkflowManager};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "agentflow")]
#[command(about = "Agent request engine CLI", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one request and wait for its result
    Run {
        /// Agent id or name
        #[arg(short, long)]
        agent: String,

        /// Function to invoke
        #[arg(short, long)]
        function: String,

        /// Parameters as JSON string
        #[arg(short, long)]
        params: Option<String>,

        /// Override the configured timeout
        #[arg(long)]
        timeout_ms: Option<u64>,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Submit a JSON array of requests and wait for all of them
    Batch {
        /// Path to batch JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Finished requests to keep in the status report
        #[arg(long, default_value_t = 100)]
        keep: usize,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Validate a function configuration file
    Validate {
        /// Path to JSON or YAML configuration
        file: PathBuf,
    },

    /// List built-in agents
    Agents,

    /// Create an example function configuration
    Init {
        /// Output file path
        #[arg(short, long, default_value = "functions.json")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct EngineArgs {
    /// Function configuration file (JSON or YAML)
    #[arg(long)]
    functions: Option<PathBuf>,

    /// Worker pool size
    #[arg(short, long, default_value_t = 4)]
    workers: usize,

    /// Maximum queued requests
    #[arg(long, default_value_t = 100)]
    queue_size: usize,

    /// Timeout for functions without a configured one
    #[arg(long, default_value_t = 30_000)]
    default_timeout_ms: u64,

    /// Seconds to wait for results before giving up
    #[arg(long, default_value_t = 120)]
    wait_secs: u64,
}

#[derive(Debug, Deserialize)]
struct BatchEntry {
    agent: String,
    function: String,
    #[serde(default)]
    params: Value,
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run {
            agent,
            function,
            params,
            timeout_ms,
            engine,
        } => {
            run_request(&agent, &function, params, timeout_ms, engine).await?;
        }

        Commands::Batch { file, keep, engine } => {
            run_batch(&file, keep, engine).await?;
        }

        Commands::Validate { file } => {
            validate_functions(&file)?;
        }

        Commands::Agents => {
            list_agents();
        }

        Commands::Init { output } => {
            create_example_config(&output)?;
        }
    }

    Ok(())
}

fn builtin_registry() -> AgentManager {
    let mut registry = AgentManager::new();
    agentbuiltins::register_all(&mut registry);
    registry
}

async fn build_manager(engine: &EngineArgs) -> Result<WorkflowManager> {
    let config = ManagerConfig::default()
        .with_max_workers(engine.workers)
        .with_max_queue_size(engine.queue_size)
        .with_default_timeout_ms(engine.default_timeout_ms);
    let manager = WorkflowManager::with_config(Arc::new(builtin_registry()), config);

    if let Some(path) = &engine.functions {
        let count = manager
            .load_function_configs_from_path(path)
            .await
            .with_context(|| format!("loading function configs from {}", path.display()))?;
        tracing::debug!("{} functions configured", count);
    }

    manager.start().await;
    Ok(manager)
}

fn parse_params(params: Option<String>) -> Result<Value> {
    match params {
        Some(raw) => serde_json::from_str(&raw).context("params must be valid JSON"),
        None => Ok(json!({})),
    }
}

async fn run_request(
    agent: &str,
    function: &str,
    params: Option<String>,
    timeout_ms: Option<u64>,
    engine: EngineArgs,
) -> Result<()> {
    let params = parse_params(params)?;
    let manager = build_manager(&engine).await?;

    // Subscribe to events for real-time output
    let mut events = manager.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                RequestEvent::Submitted {
                    request_id,
                    agent_id,
                    function_name,
                    ..
                } => {
                    println!("📨 Submitted {} -> {}.{}", request_id, agent_id, function_name);
                }
                RequestEvent::Started { worker, .. } => {
                    println!("  ⚡ Running on worker {}", worker);
                }
                RequestEvent::Finished {
                    state,
                    duration_ms,
                    error,
                    ..
                } => match error {
                    None => println!("  ✅ {} in {}ms", state, duration_ms),
                    Some(error) => println!("  ❌ {}: {}", state, error),
                },
            }
        }
    });

    let request_id = match timeout_ms {
        Some(ms) => {
            manager
                .submit_request_with_timeout(agent, function, params, ms)
                .await?
        }
        None => manager.submit_request(agent, function, params).await?,
    };

    let record = manager
        .wait_for_completion(&request_id, Duration::from_secs(engine.wait_secs))
        .await
        .context("request disappeared from the store")?;

    // Give the event printer a moment to catch up
    tokio::time::sleep(Duration::from_millis(50)).await;
    event_task.abort();
    manager.stop().await;

    println!();
    println!("{}", serde_json::to_string_pretty(&manager.get_request_result(&request_id).await)?);

    if record.state != RequestState::Completed {
        anyhow::bail!("request finished in state {}", record.state);
    }
    Ok(())
}

async fn run_batch(file: &Path, keep: usize, engine: EngineArgs) -> Result<()> {
    println!("🚀 Loading batch from: {}", file.display());

    let raw = std::fs::read_to_string(file)?;
    let entries: Vec<BatchEntry> = serde_json::from_str(&raw)?;
    let manager = build_manager(&engine).await?;

    let mut submitted = Vec::new();
    for entry in entries {
        let params = if entry.params.is_null() {
            json!({})
        } else {
            entry.params
        };
        let result = match entry.timeout_ms {
            Some(ms) => {
                manager
                    .submit_request_with_timeout(&entry.agent, &entry.function, params, ms)
                    .await
            }
            None => {
                manager
                    .submit_request(&entry.agent, &entry.function, params)
                    .await
            }
        };

        match result {
            Ok(id) => submitted.push(id),
            Err(e) => println!("  ⚠️  {}.{} rejected: {}", entry.agent, entry.function, e),
        }
    }
    println!("📋 Submitted {} requests", submitted.len());

    let wait = Duration::from_secs(engine.wait_secs);
    for id in &submitted {
        manager.wait_for_completion(id, wait).await;
    }
    manager.stop().await;
    manager.cleanup_completed_requests(keep).await;

    println!();
    println!("📊 Recent requests:");
    for record in manager.list_recent_requests(keep).await {
        let detail = record.error.clone().unwrap_or_default();
        println!(
            "   {} {}.{} {} {}",
            record.id, record.agent_id, record.function_name, record.state, detail
        );
    }

    println!();
    println!("{}", serde_json::to_string_pretty(&manager.get_system_status().await)?);
    Ok(())
}

fn validate_functions(file: &Path) -> Result<()> {
    println!("🔍 Validating function configuration: {}", file.display());

    let document = FunctionConfigDocument::from_path(file)?;
    let table = FunctionConfigTable::from_document(document);

    println!("✅ {} functions:", table.len());
    for name in table.function_names() {
        let Some(config) = table.get(&name) else {
            continue;
        };
        let timeout = config
            .timeout_ms
            .map(|ms| format!("{}ms", ms))
            .unwrap_or_else(|| "default".to_string());
        let required: Vec<&str> = config.required_parameters().collect();
        println!("  • {} (timeout {})", name, timeout);
        if !config.description.is_empty() {
            println!("    {}", config.description);
        }
        if !required.is_empty() {
            println!("    required: {}", required.join(", "));
        }
    }

    Ok(())
}

fn list_agents() {
    println!("📦 Available Agents:");
    println!();

    for info in builtin_registry().describe() {
        println!("  • {} [{}]", info.name, info.functions.join(", "));
        if !info.description.is_empty() {
            println!("    {}", info.description);
        }
    }
}

fn create_example_config(output: &Path) -> Result<()> {
    let document: FunctionConfigDocument = serde_json::from_value(json!({
        "functions": {
            "echo": {
                "description": "Echo parameters back",
                "timeout_ms": 5000,
                "parameters": [{ "name": "data", "type": "string", "required": true }]
            },
            "sleep": {
                "description": "Wait before answering",
                "timeout_ms": 2000,
                "parameters": [{ "name": "delay_ms", "type": "integer", "required": false }]
            }
        }
    }))?;

    let json = serde_json::to_string_pretty(&document)?;
    std::fs::write(output, json)?;

    println!("✨ Created example function configuration: {}", output.display());
    println!();
    println!("Run with it:");
    println!(
        "  agentflow run --agent echo --function echo --params '{{\"data\": \"x\"}}' --functions {}",
        output.display()
    );

    Ok(())
}
