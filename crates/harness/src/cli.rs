use clap::{Parser, Subcommand};

/// ok-harness — runs the orchestration kernel's seed scenarios end to end.
#[derive(Debug, Parser)]
#[command(name = "ok-harness", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one named scenario (default when no subcommand is given: run all).
    Scenario {
        /// Scenario name, e.g. "s1" or "s6". See `list` for the full set.
        name: String,
    },
    /// List every scenario this harness knows how to run.
    List,
    /// Print version information.
    Version,
}
