//! The orchestration kernel: activation scheduling, the per-session turn
//! loop, the event log, and end-of-run memory summarization. Everything
//! else (providers, tools, policy, VFS, memory) is a dependency this crate
//! wires together rather than owns.

pub mod agent_registry;
pub mod eventlog;
pub mod kernel;
pub mod semaphore;
pub mod summarizer;
pub mod turn;

pub use agent_registry::AgentRegistry;
pub use eventlog::{Checkpoint, EventLog};
pub use kernel::{Kernel, KernelDeps};
pub use semaphore::{PermitGuard, Semaphore};
pub use summarizer::{apply_outcome, AppliedOp, ConsolidateFn, ConsolidationOp, ConsolidationResult, ExtractedMemory, SummarizeFn, SummarizeOutcome, Summarizer};
pub use turn::{run_turn, TurnResult};
