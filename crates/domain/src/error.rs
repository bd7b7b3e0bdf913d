/// Shared error type for the orchestration kernel.
///
/// Kernel-level infrastructure failures (this type) transition a session to
/// `Error` but never unwind the scheduler. Tool-level failures never reach
/// this type at all — they are encoded as message content so the model can
/// observe and react to them (see `ok_tools::ToolHandler::handle`).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("provider stream error: {0}")]
    ProviderStream(String),

    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("token budget exceeded: used {used}, budget {budget}")]
    BudgetExceeded { used: u64, budget: u64 },

    #[error("loop detected for agent {agent_id}")]
    LoopDetected { agent_id: String },

    #[error("spawn depth limit reached: {depth} >= {max}")]
    DepthLimit { depth: u32, max: u32 },

    #[error("spawn fanout limit reached for {agent_id}: {count} >= {max}")]
    FanoutLimit { agent_id: String, count: u32, max: u32 },

    #[error("policy blocked tool '{tool}': {reason}")]
    PolicyBlocked { tool: String, reason: String },

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("missing agent profile: {0}")]
    MissingAgentProfile(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
