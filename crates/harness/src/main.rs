mod cli;
mod scenarios;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            init_tracing();
            run_all().await
        }
        Some(Command::Scenario { name }) => {
            init_tracing();
            run_one(&name).await
        }
        Some(Command::List) => {
            for name in scenarios::ALL {
                println!("{name}");
            }
            Ok(())
        }
        Some(Command::Version) => {
            println!("ok-harness {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_one(name: &str) -> anyhow::Result<()> {
    match scenarios::run(name).await {
        Ok(report) => {
            println!("{}: PASS — {}", report.name, report.detail);
            Ok(())
        }
        Err(err) => {
            eprintln!("{name}: FAIL — {err}");
            std::process::exit(1);
        }
    }
}

async fn run_all() -> anyhow::Result<()> {
    let mut failures = 0;
    for name in scenarios::ALL {
        match scenarios::run(name).await {
            Ok(report) => println!("{}: PASS — {}", report.name, report.detail),
            Err(err) => {
                eprintln!("{name}: FAIL — {err}");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Structured JSON tracing, same filter fallback the gateway CLI this
/// harness is descended from uses.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ok_harness=debug")))
        .json()
        .init();
}
