//! Working memory (run-scoped) and long-term memory (persistent, retrieved
//! by keyword or semantic score) plus the markdown prompt builder that
//! surfaces retrieved memories to an agent's system prompt.

pub mod ltm;
pub mod prompt;
pub mod vector;
pub mod working;

pub use ltm::{LongTermMemory, StoreInput};
pub use prompt::{build_memory_prompt, MemoryPromptSource};
pub use vector::{AddInput, MemoryType, MemoryVector, ScoredMemory, SearchOptions, UpdateInput, VectorStore, GLOBAL_AGENT};
pub use working::{Entry, NewEntry, Snapshot, WorkingMemory};
