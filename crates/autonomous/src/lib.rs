//! Multi-cycle mission runner: repeatedly drives a fresh `ok_core::Kernel`
//! to completion, carrying a task queue and VFS across cycles while
//! summarizing each cycle's run into long-term memory before the next.

pub mod runner;

pub use runner::{AutonomousConfig, AutonomousDeps, AutonomousRunner, CycleEvent};
