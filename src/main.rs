//! stest - data-driven RPC scenario test runner
//!
//! Runs JSON/YAML scenario documents against a live gRPC or Connect service
//! and reports a pass/fail/fatal verdict per case.

use clap::Parser;
use std::path::PathBuf;
use stest::commands::Commands;
use stest::{cli, common};

#[derive(Parser)]
#[command(name = "stest", about = "Data-driven RPC scenario tests")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug logs
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    common::logging::init_cli(cli.verbose);

    match cli::dispatch(cli.command, cli.config.as_deref()).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    }
}
