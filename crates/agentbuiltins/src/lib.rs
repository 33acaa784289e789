//! Standard agent library
//!
//! Built-in agents used by the CLI and for exercising the engine

mod echo;
mod time;
mod transform;

pub use echo::EchoAgent;
pub use time::DelayAgent;
pub use transform::TransformAgent;
use agentruntime::AgentManager;

use std::sync::Arc;

/// Register all standard agents with a registry
pub fn register_all(registry: &mut AgentManager) {
    registry.register(Arc::new(EchoAgent::new()));
    registry.register(Arc::new(DelayAgent));
    registry.register(Arc::new(TransformAgent));
}
