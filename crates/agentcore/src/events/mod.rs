// crates/agentcore/src/events/mod.rs

mod base;

pub use base::{EventBus, RequestEvent};
