//! Shared vocabulary for the orchestration kernel: activations, agent
//! profiles, policy, messages, streaming chunks, config, and the error type.
//!
//! This crate holds data, not behavior — every other kernel crate depends on
//! it, and it depends on none of them.

pub mod activation;
pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod policy;
pub mod stream;
pub mod tool;
pub mod trace;

pub use activation::{ActId, Activation, AgentPath};
pub use agent::{AgentProfile, CustomToolDef};
pub use config::KernelConfig;
pub use error::{Error, Result};
pub use events::{EventLogEntry, EventSink, EventType, NewEvent};
pub use policy::{GlobPattern, Permissions, Policy, PolicyMode};
pub use stream::{looks_like_quota_error, BoxStream, StreamChunk, Usage};
pub use tool::{Message, ToolCall, ToolDefinition};
