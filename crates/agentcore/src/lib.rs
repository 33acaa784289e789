//! Core abstractions for the agent request engine
//!
//! This crate provides the types and traits the runtime is built on: the
//! agent contracts, the request record and its state machine, the function
//! configuration table and the lifecycle events. It has no runtime of its own.

mod agent;
mod error;
pub mod events;
mod function_config;
mod request;

pub use agent::{Agent, AgentId, AgentRegistry};
pub use error::{AgentError, ConfigError, EngineError, SubmitError};
pub use events::*;
pub use function_config::{
    FunctionConfig, FunctionConfigDocument, FunctionConfigTable, ParameterSpec,
};
pub use request::{RequestId, RequestRecord, RequestState};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
