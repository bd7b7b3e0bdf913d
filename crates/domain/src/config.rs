use serde::{Deserialize, Serialize};

/// Kernel-wide tunables. Defaults mirror the reference scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    #[serde(default = "d_max_concurrency")]
    pub max_concurrency: u32,
    #[serde(default = "d_max_depth")]
    pub max_depth: u32,
    #[serde(default = "d_max_fanout")]
    pub max_fanout: u32,
    #[serde(default = "d_token_budget")]
    pub token_budget: u64,
    /// Model override applied ahead of the per-agent profile model.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "d_true")]
    pub memory_enabled: bool,
    #[serde(default = "d_max_nudges")]
    pub max_nudges: u32,
    #[serde(default)]
    pub min_turns_before_stop: u32,
    #[serde(default = "d_true")]
    pub auto_record_failures: bool,
    #[serde(default)]
    pub force_reflection: bool,
    #[serde(default = "d_wrap_up_threshold")]
    pub wrap_up_threshold: f64,
    #[serde(default = "d_max_turns")]
    pub max_agent_turns: u32,
}

fn d_max_concurrency() -> u32 {
    4
}
fn d_max_depth() -> u32 {
    5
}
fn d_max_fanout() -> u32 {
    8
}
fn d_token_budget() -> u64 {
    200_000
}
fn d_true() -> bool {
    true
}
fn d_max_nudges() -> u32 {
    3
}
fn d_wrap_up_threshold() -> f64 {
    1.0
}
fn d_max_turns() -> u32 {
    25
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_concurrency: d_max_concurrency(),
            max_depth: d_max_depth(),
            max_fanout: d_max_fanout(),
            token_budget: d_token_budget(),
            model: None,
            memory_enabled: true,
            max_nudges: d_max_nudges(),
            min_turns_before_stop: 0,
            auto_record_failures: true,
            force_reflection: false,
            wrap_up_threshold: d_wrap_up_threshold(),
            max_agent_turns: d_max_turns(),
        }
    }
}

pub const DEFAULT_MODEL: &str = "default/base";
