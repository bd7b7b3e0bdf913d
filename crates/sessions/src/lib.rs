//! Observable mirror of the kernel's active and completed sessions.

pub mod store;

pub use store::{Session, SessionStatus, SessionStore, ToolCallRecord};
