//! CLI command definitions
//!
//! Defines the clap commands for the stest CLI.

use clap::Subcommand;
use std::path::PathBuf;

use crate::common::config::Protocol;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scenario against a live gRPC or Connect service
    Run {
        /// Scenario document (.json, .yaml or .yml)
        scenario: PathBuf,

        /// Service manifest (TOML) describing the methods to bind
        #[arg(long, short)]
        service: PathBuf,

        /// Base URL of the service (overrides the config file)
        #[arg(long, short)]
        target: Option<String>,

        /// Wire protocol of the service (overrides the config file)
        #[arg(long, value_enum)]
        protocol: Option<Protocol>,

        /// Abort the whole run after this many seconds
        #[arg(long)]
        deadline: Option<u64>,

        /// Stop after the first case that does not pass
        #[arg(long)]
        fail_fast: bool,

        /// Print the outcomes as one JSON document
        #[arg(long)]
        json: bool,
    },

    /// Load a scenario and report problems without calling anything
    Check {
        /// Scenario document (.json, .yaml or .yml)
        scenario: PathBuf,

        /// Service manifest; when given, unknown actions are reported
        #[arg(long, short)]
        service: Option<PathBuf>,
    },
}
