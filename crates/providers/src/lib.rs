//! The `AIProvider`/`EmbeddingEngine` interfaces the kernel drives, plus a
//! scripted test double for each. Concrete model backends are outside this
//! crate's scope — see `SPEC_FULL.md` §6.

pub mod embedding;
pub mod scripted;
pub mod traits;

pub use embedding::HashEmbeddingEngine;
pub use scripted::{ScriptedProvider, ScriptedTurn};
pub use traits::{AIProvider, ChatContext, EmbeddingEngine, SessionRegisterable};
