//! Request execution runtime
//!
//! This crate provides the engine that accepts agent function requests,
//! queues them on a bounded FIFO, runs them on a worker pool under
//! per-function deadlines and keeps their lifecycle in an in-memory store.

mod config;
mod manager;
mod queue;
mod registry;
mod stats;
mod store;
mod worker;

pub use config::ManagerConfig;
pub use manager::WorkflowManager;
pub use queue::WorkQueue;
pub use registry::{AgentInfo, AgentManager};
pub use stats::{Statistics, StatisticsSnapshot};
pub use store::RequestStore;
